// Logging module - logger setup and krshell directories
use std::path::PathBuf;
use anyhow::{Result, Context};

/// Initialize the `log` facade for the binary
///
/// `RUST_LOG` wins when set; otherwise shell core targets log at info, or
/// debug with `verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(default_level);

    // A second init (tests, embedding) is harmless
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

/// Safely truncate a string to a maximum number of characters
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        // Reserve space for "..." suffix
        let trunc_chars = if max_chars >= 3 { max_chars - 3 } else { 0 };
        format!("{}...", s.chars().take(trunc_chars).collect::<String>())
    }
}

/// Collapse a multi-line command into one loggable line
pub fn command_preview(command: &str, max_chars: usize) -> String {
    let single_line = command
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("; ");
    safe_truncate(&single_line, max_chars)
}

/// Get or create the base krshell directory (~/.krshell)
pub fn get_krshell_dir() -> Result<PathBuf> {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Failed to get home directory")?;

    let krshell_dir = PathBuf::from(home_dir)
        .join(".krshell");

    // Create directory if it doesn't exist
    if !krshell_dir.exists() {
        std::fs::create_dir_all(&krshell_dir)
            .context("Failed to create krshell directory")?;
    }

    Ok(krshell_dir)
}

/// Get or create the logs directory (~/.krshell/logs)
pub fn get_logs_dir() -> Result<PathBuf> {
    let logs_dir = get_krshell_dir()?.join("logs");

    if !logs_dir.exists() {
        std::fs::create_dir_all(&logs_dir)
            .context("Failed to create logs directory")?;
    }

    Ok(logs_dir)
}

/// Get or create the private data directory (~/.krshell/data)
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = get_krshell_dir()?.join("data");

    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)
            .context("Failed to create data directory")?;
    }

    Ok(data_dir)
}
