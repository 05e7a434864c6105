/// Shell process factory: normal and elevated interactive shells over pipes
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};
use krshell_config::ShellConfig;

/// How to start a shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellLauncher {
    /// Program (plus arguments) for normal shells
    pub shell: String,
    /// Program (plus arguments) for elevated shells
    pub su: String,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl ShellLauncher {
    pub fn new(shell: impl Into<String>, su: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            su: su.into(),
            env: BTreeMap::new(),
            working_dir: None,
        }
    }

    pub fn from_config(config: &ShellConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            su: config.su.clone(),
            env: config.env.clone(),
            working_dir: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Program line used for the requested privilege level
    pub fn program(&self, elevated: bool) -> &str {
        if elevated {
            &self.su
        } else {
            &self.shell
        }
    }

    /// Build a command with all three standard streams piped
    ///
    /// The program line is split on whitespace, so `"su --mount-master"` works.
    pub fn command(&self, elevated: bool) -> Command {
        let mut parts = self.program(elevated).split_whitespace();
        let program = parts.next().unwrap_or("sh");

        let mut command = Command::new(program);
        command
            .args(parts)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(ref dir) = self.working_dir {
            command.current_dir(dir);
        }

        command
    }
}

/// Lifetime control over a spawned shell
pub trait ProcessControl: Send {
    fn pid(&self) -> Option<u32>;

    /// Exit code if the process already finished
    fn exit_status(&mut self) -> io::Result<Option<i32>>;

    /// Best-effort kill and reap; safe to call repeatedly
    fn terminate(&mut self);
}

impl ProcessControl for Child {
    fn pid(&self) -> Option<u32> {
        Some(self.id())
    }

    fn exit_status(&mut self) -> io::Result<Option<i32>> {
        Ok(self.try_wait()?.map(|status| status.code().unwrap_or(-1)))
    }

    fn terminate(&mut self) {
        if let Ok(Some(_)) = self.try_wait() {
            return;
        }
        let _ = self.kill();
        let _ = self.wait();
    }
}

/// A spawned shell split into its streams
pub struct ShellProcess {
    pub stdin: Box<dyn Write + Send>,
    pub stdout: Box<dyn Read + Send>,
    pub stderr: Option<Box<dyn Read + Send>>,
    pub control: Box<dyn ProcessControl>,
}

impl std::fmt::Debug for ShellProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellProcess")
            .field("pid", &self.control.pid())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

impl ShellProcess {
    /// Take the piped streams out of a freshly spawned child
    pub fn from_child(mut child: Child) -> Result<Self> {
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            child.terminate();
            anyhow::bail!("Shell was spawned without piped stdin/stdout");
        };

        Ok(Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: stderr.map(|s| Box::new(s) as Box<dyn Read + Send>),
            control: Box::new(child),
        })
    }
}

/// Factory for shell processes; the seam tests and embedders replace
pub trait ShellSpawner: Send + Sync {
    fn spawn(&self, elevated: bool) -> Result<ShellProcess>;

    /// Get spawner name for debugging
    fn spawner_name(&self) -> &str;
}

/// Spawns real processes from a [`ShellLauncher`]
#[derive(Debug, Clone)]
pub struct CommandSpawner {
    launcher: ShellLauncher,
}

impl CommandSpawner {
    pub fn new(launcher: ShellLauncher) -> Self {
        Self { launcher }
    }

    pub fn launcher(&self) -> &ShellLauncher {
        &self.launcher
    }
}

impl ShellSpawner for CommandSpawner {
    fn spawn(&self, elevated: bool) -> Result<ShellProcess> {
        let program = self.launcher.program(elevated);
        let child = self
            .launcher
            .command(elevated)
            .spawn()
            .with_context(|| format!("Failed to start '{}'", program))?;
        ShellProcess::from_child(child)
    }

    fn spawner_name(&self) -> &str {
        "command"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn test_program_selection() {
        let launcher = ShellLauncher::new("sh", "su -mm");
        assert_eq!(launcher.program(false), "sh");
        assert_eq!(launcher.program(true), "su -mm");

        let command = launcher.command(true);
        assert_eq!(command.get_program(), "su");
        assert_eq!(command.get_args().collect::<Vec<_>>(), vec!["-mm"]);
    }

    #[test]
    fn test_from_config() {
        let mut config = ShellConfig::default();
        config.su = "/system/bin/su".to_string();
        config.env.insert("LANG".to_string(), "C".to_string());

        let launcher = ShellLauncher::from_config(&config);
        assert_eq!(launcher.su, "/system/bin/su");
        assert_eq!(launcher.env.get("LANG"), Some(&"C".to_string()));
    }

    #[test]
    fn test_spawn_and_terminate() {
        let spawner = CommandSpawner::new(ShellLauncher::new("sh", "sh").with_env("KR_TEST", "42"));
        let mut process = spawner.spawn(false).unwrap();

        process.stdin.write_all(b"echo $KR_TEST\n").unwrap();
        process.stdin.flush().unwrap();

        let mut reader = std::io::BufReader::new(process.stdout);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line.trim(), "42");

        assert_eq!(process.control.exit_status().unwrap(), None);
        process.control.terminate();
        process.control.terminate();
        assert!(process.control.exit_status().unwrap().is_some());
    }

    #[test]
    fn test_spawn_missing_program() {
        let spawner = CommandSpawner::new(ShellLauncher::new("sh", "/nonexistent/su-binary"));
        let error = spawner.spawn(true).unwrap_err();
        assert!(error.to_string().contains("/nonexistent/su-binary"));
    }
}
