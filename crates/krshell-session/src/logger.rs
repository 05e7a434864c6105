use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Result, Context};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;

/// Transcript shared between a session's caller and its stderr drain thread
pub type Transcript = Arc<Mutex<SessionLogger>>;

/// JSONL transcript of one shell session's I/O and lifecycle
pub struct SessionLogger {
    session_id: u64,
    log_file: File,
    path: PathBuf,
}

impl SessionLogger {
    /// Create a new session logger
    pub fn new(session_id: u64, log_dir: &Path) -> Result<Self> {
        // Ensure log directory exists
        std::fs::create_dir_all(log_dir)
            .context("Failed to create transcript directory")?;

        let path = log_dir.join(format!(
            "shell-{}-{}.jsonl",
            std::process::id(),
            session_id
        ));

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to create transcript file")?;

        Ok(Self {
            session_id,
            log_file,
            path,
        })
    }

    pub fn shared(self) -> Transcript {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log a command written to the shell
    pub fn log_input(&mut self, data: &str) -> Result<()> {
        self.log_event("in", data)
    }

    /// Log a framed command result
    pub fn log_output(&mut self, data: &str) -> Result<()> {
        self.log_event("out", data)
    }

    /// Log a stderr line
    pub fn log_error(&mut self, data: &str) -> Result<()> {
        self.log_event("err", data)
    }

    /// Log start/stop and failure events
    pub fn log_lifecycle(&mut self, event: &str, detail: Option<&str>) -> Result<()> {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "session_id": self.session_id,
            "event": event,
            "detail": detail,
        });

        writeln!(self.log_file, "{}", entry)
            .context("Failed to write to transcript")?;
        self.log_file.flush()?;

        Ok(())
    }

    fn log_event(&mut self, direction: &str, data: &str) -> Result<()> {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "session_id": self.session_id,
            "direction": direction,
            "data": data,
        });

        writeln!(self.log_file, "{}", entry)
            .context("Failed to write to transcript")?;
        self.log_file.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_transcript_entries() {
        let temp_dir = TempDir::new().unwrap();
        let mut logger = SessionLogger::new(7, temp_dir.path()).unwrap();

        logger.log_lifecycle("start", Some("sh")).unwrap();
        logger.log_input("echo hi").unwrap();
        logger.log_output("hi").unwrap();
        logger.log_error("warning").unwrap();

        let content = std::fs::read_to_string(logger.path()).unwrap();
        let entries: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0]["event"], "start");
        assert_eq!(entries[0]["detail"], "sh");
        assert_eq!(entries[1]["direction"], "in");
        assert_eq!(entries[1]["data"], "echo hi");
        assert_eq!(entries[2]["direction"], "out");
        assert_eq!(entries[3]["direction"], "err");
        assert!(entries.iter().all(|entry| entry["session_id"] == 7));
    }
}
