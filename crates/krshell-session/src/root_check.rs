// Root verification
use krshell_types::RootStatus;

use crate::keep_shell::KeepShell;

/// Built-in privilege probe
///
/// Prints `success` when the shell runs as uid 0 or can write a sentinel file
/// under `/cache`, otherwise `permission denied`. Never exits the shell.
pub const ROOT_CHECK_SCRIPT: &str = r#"if [ "$(id -u 2>/dev/null)" = "0" ] || [ "$UID" = "0" ] || [ "$(whoami 2>/dev/null)" = "root" ]; then
  echo 'success'
elif echo 'krshell' > /cache/krshell_root_check 2>/dev/null && [ "$(cat /cache/krshell_root_check 2>/dev/null)" = "krshell" ]; then
  rm -f /cache/krshell_root_check
  echo 'success'
else
  echo 'permission denied'
fi"#;

/// Answers that mean the probe could not run with privilege
const DENIAL_MARKERS: [&str; 4] = ["error", "permission denied", "not allowed", "not found"];

/// Classify the probe's answer
pub fn classify_root_response(answer: &str) -> RootStatus {
    let answer = answer.to_lowercase();
    if is_denial(&answer) {
        RootStatus::Denied
    } else if answer.contains("success") {
        RootStatus::Granted
    } else {
        RootStatus::Denied
    }
}

fn is_denial(answer: &str) -> bool {
    DENIAL_MARKERS.iter().any(|marker| answer.contains(marker))
}

impl KeepShell {
    /// Run the privilege probe on the persistent session
    ///
    /// A denial in root mode also destroys the session so the next command
    /// retries elevation from scratch.
    pub fn check_root(&self) -> bool {
        let answer = self.do_cmd_sync(&self.options().root_probe).to_lowercase();

        if is_denial(&answer) {
            if self.root_mode() {
                self.try_exit();
            }
            log::info!(target: "keep_shell", "Root check denied: {}", answer);
            return false;
        }

        answer.contains("success")
    }
}
