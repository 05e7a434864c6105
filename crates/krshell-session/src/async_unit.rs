// Asynchronous shell unit: streams a shell's stdout/stderr lines as events
// instead of framing individual commands.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use krshell_logging::command_preview;
use krshell_types::ShellEvent;

use crate::process::ShellLauncher;

/// How long `wait_for` keeps draining output after the process exits
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Continuation run after the shell has exited
pub type ExitContinuation = Box<dyn FnOnce() + Send + 'static>;

/// A shell whose output is delivered as [`ShellEvent`]s
///
/// Must be used from within a tokio runtime.
pub struct AsyncShellUnit {
    launcher: ShellLauncher,
    elevated: bool,
    events: UnboundedSender<ShellEvent>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    readers: Vec<JoinHandle<()>>,
}

impl AsyncShellUnit {
    pub fn new(launcher: ShellLauncher, elevated: bool, events: UnboundedSender<ShellEvent>) -> Self {
        Self {
            launcher,
            elevated,
            events,
            child: None,
            stdin: None,
            readers: Vec::new(),
        }
    }

    /// Unit together with the receiving end of its event channel
    pub fn channel(launcher: ShellLauncher, elevated: bool) -> (Self, UnboundedReceiver<ShellEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(launcher, elevated, tx), rx)
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Spawn the shell and its line readers; does nothing when already running
    pub fn start(&mut self) -> bool {
        if self.child.is_some() {
            return true;
        }

        let mut command = Command::from(self.launcher.command(self.elevated));
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                log::warn!(
                    target: "async_shell",
                    "Failed to start '{}': {}",
                    self.launcher.program(self.elevated),
                    e
                );
                let _ = self.events.send(ShellEvent::Started(false));
                return false;
            }
        };

        if let Some(stdout) = child.stdout.take() {
            let events = self.events.clone();
            self.readers.push(tokio::spawn(forward_lines(stdout, events, ShellEvent::Output)));
        }
        if let Some(stderr) = child.stderr.take() {
            let events = self.events.clone();
            self.readers.push(tokio::spawn(forward_lines(stderr, events, ShellEvent::Error)));
        }

        self.stdin = child.stdin.take();
        self.child = Some(child);
        let _ = self.events.send(ShellEvent::Started(true));
        true
    }

    /// Write `command` to the shell, starting it first if needed
    ///
    /// Failures are reported as [`ShellEvent::ExecFailed`].
    pub async fn exec(&mut self, command: &str) -> &mut Self {
        if self.child.is_none() {
            self.start();
        }

        let result = match self.stdin.as_mut() {
            Some(stdin) => write_line(stdin, command).await,
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "shell is not running",
            )),
        };

        if let Err(e) = result {
            log::warn!(
                target: "async_shell",
                "Failed to write '{}': {}",
                command_preview(command, 80),
                e
            );
            let _ = self.events.send(ShellEvent::ExecFailed(e.to_string()));
        }

        self
    }

    /// Ask the shell to exit and finish in the background
    ///
    /// The returned task emits [`ShellEvent::Exited`] once the process is
    /// gone and its output is drained, then runs `next`. With no running
    /// shell `next` runs right away and nothing is emitted.
    pub fn wait_for(&mut self, next: Option<ExitContinuation>) -> Option<JoinHandle<()>> {
        let Some(mut child) = self.child.take() else {
            if let Some(next) = next {
                next();
            }
            return None;
        };

        let stdin = self.stdin.take();
        let readers = std::mem::take(&mut self.readers);
        let events = self.events.clone();

        Some(tokio::spawn(async move {
            let success = finish_child(&mut child, stdin).await;
            drain_readers(readers).await;
            let _ = events.send(ShellEvent::Exited(success));
            drop(child);

            if let Some(next) = next {
                next();
            }
        }))
    }

    /// Close stdin and kill the shell; safe to call repeatedly
    pub fn destroy(&mut self) {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                log::debug!(target: "async_shell", "Kill failed: {}", e);
            }
        }
        for reader in self.readers.drain(..) {
            reader.abort();
        }
    }
}

impl Drop for AsyncShellUnit {
    fn drop(&mut self) {
        self.destroy();
    }
}

async fn write_line(stdin: &mut ChildStdin, command: &str) -> std::io::Result<()> {
    stdin.write_all(command.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

/// Send `exit`, wait for termination and report whether it exited cleanly
async fn finish_child(child: &mut Child, stdin: Option<ChildStdin>) -> bool {
    if let Some(mut stdin) = stdin {
        if let Err(e) = write_line(&mut stdin, "exit").await {
            log::debug!(target: "async_shell", "Failed to send exit: {}", e);
            let _ = child.start_kill();
        }
        // Dropping stdin gives the shell EOF as well
    }

    match child.wait().await {
        Ok(status) => status.success(),
        Err(e) => {
            log::warn!(target: "async_shell", "Wait failed: {}", e);
            false
        }
    }
}

async fn drain_readers(readers: Vec<JoinHandle<()>>) {
    for mut reader in readers {
        if tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut reader).await.is_err() {
            reader.abort();
        }
    }
}

/// Forward non-empty trimmed lines from `stream` as events
async fn forward_lines<R>(stream: R, events: UnboundedSender<ShellEvent>, wrap: fn(String) -> ShellEvent)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if events.send(wrap(line.to_string())).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_unit() -> (AsyncShellUnit, UnboundedReceiver<ShellEvent>) {
        AsyncShellUnit::channel(ShellLauncher::new("sh", "sh"), false)
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (mut unit, mut rx) = create_unit();
        assert!(unit.start());
        assert!(unit.start());
        assert!(unit.is_running());

        assert_eq!(rx.recv().await, Some(ShellEvent::Started(true)));
        unit.destroy();
        unit.destroy();
        assert!(!unit.is_running());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_failure() {
        let (mut unit, mut rx) =
            AsyncShellUnit::channel(ShellLauncher::new("/nonexistent/sh", "/nonexistent/sh"), false);
        assert!(!unit.start());
        assert_eq!(rx.recv().await, Some(ShellEvent::Started(false)));

        unit.exec("echo hi").await;
        assert_eq!(rx.recv().await, Some(ShellEvent::Started(false)));
        assert!(matches!(rx.recv().await, Some(ShellEvent::ExecFailed(_))));
    }

    #[tokio::test]
    async fn test_wait_for_without_process_runs_next() {
        let (mut unit, mut rx) = create_unit();
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        let handle = unit.wait_for(Some(Box::new(move || {
            let _ = done_tx.send(());
        })));

        assert!(handle.is_none());
        assert!(done_rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
