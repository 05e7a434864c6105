use std::sync::Arc;

use tokio::task::JoinHandle;

use krshell_session::{AsyncShellUnit, ExitContinuation, KeepShell};

/// A script running on its own streaming shell
pub struct ScriptRun {
    unit: AsyncShellUnit,
    tag: String,
    shell: Arc<KeepShell>,
    stop_command: String,
}

impl ScriptRun {
    pub(crate) fn new(unit: AsyncShellUnit, tag: String, shell: Arc<KeepShell>, stop_command: String) -> Self {
        Self {
            unit,
            tag,
            shell,
            stop_command,
        }
    }

    /// Value of `shell_progres` exported to the run
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_running(&self) -> bool {
        self.unit.is_running()
    }

    /// Kill the run's process tree and tear the shell down
    ///
    /// Returns whatever the toolkit's `killtree` printed.
    pub fn force_stop(&mut self) -> String {
        log::info!(target: "script_env", "Force stopping {}", self.tag);
        let output = self.shell.do_cmd_sync(&self.stop_command);
        self.unit.destroy();
        output
    }

    /// Let the script finish, then run `next`
    pub fn wait(&mut self, next: Option<ExitContinuation>) -> Option<JoinHandle<()>> {
        self.unit.wait_for(next)
    }
}
