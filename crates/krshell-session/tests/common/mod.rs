#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use krshell_session::{CommandSpawner, KeepShell, KeepShellOptions, ShellLauncher};
use tempfile::TempDir;

/// Common test utilities for shell session testing
pub struct TestFixtures {
    pub temp_dir: TempDir,
}

impl TestFixtures {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Launcher that uses plain `sh` for both privilege levels
    pub fn launcher() -> ShellLauncher {
        ShellLauncher::new("sh", "sh")
    }

    pub fn spawner() -> Arc<CommandSpawner> {
        Arc::new(CommandSpawner::new(Self::launcher()))
    }

    /// Non-elevated shell with default timeouts
    pub fn create_shell() -> KeepShell {
        Self::create_shell_with(KeepShellOptions::default().with_root_mode(false))
    }

    pub fn create_shell_with(options: KeepShellOptions) -> KeepShell {
        KeepShell::new(Self::spawner(), options)
    }

    /// "Elevated" shell whose probe answers with `probe_output`
    pub fn create_root_shell(probe_output: &str, verify_on_start: bool) -> KeepShell {
        let options = KeepShellOptions::default()
            .with_root_mode(true)
            .with_verify_root_on_start(verify_on_start)
            .with_root_probe(format!("echo '{}'", probe_output));
        Self::create_shell_with(options)
    }

    pub fn short_lock_timeout() -> KeepShellOptions {
        KeepShellOptions::default()
            .with_root_mode(false)
            .with_lock_timeout(Duration::from_millis(500))
    }
}
