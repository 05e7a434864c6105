// Persistent shell session manager
//
// One long-lived shell per KeepShell. Commands are serialised through the
// session's I/O lock. Waiters only kill the session once the running
// command has held it for longer than the lock timeout.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use krshell_config::ShellConfig;
use krshell_logging::command_preview;
use krshell_translation::ShellTranslation;
use krshell_types::{
    CommandExecutor, RootStatus, SessionState, ShellError, ShellOutput, DEFAULT_LOCK_TIMEOUT_MS,
    ERROR_SENTINEL,
};

use crate::logger::{SessionLogger, Transcript};
use crate::process::{CommandSpawner, ShellLauncher, ShellSpawner};
use crate::root_check::{classify_root_response, ROOT_CHECK_SCRIPT};
use crate::session::ShellSession;
use crate::MAX_ACQUIRE_ATTEMPTS;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Behaviour knobs for a [`KeepShell`]
#[derive(Debug, Clone, PartialEq)]
pub struct KeepShellOptions {
    /// Start sessions through the elevation tool
    pub root_mode: bool,
    pub lock_timeout: Duration,
    /// Read deadline for each command, `None` waits forever
    pub command_timeout: Option<Duration>,
    pub verify_root_on_start: bool,
    pub root_probe: String,
    pub transcript_dir: Option<PathBuf>,
}

impl Default for KeepShellOptions {
    fn default() -> Self {
        Self {
            root_mode: true,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            command_timeout: None,
            verify_root_on_start: true,
            root_probe: ROOT_CHECK_SCRIPT.to_string(),
            transcript_dir: None,
        }
    }
}

impl KeepShellOptions {
    pub fn from_config(config: &ShellConfig) -> Self {
        Self {
            root_mode: config.root_mode,
            lock_timeout: config.lock_timeout(),
            command_timeout: config.command_timeout(),
            verify_root_on_start: config.verify_root_on_start,
            root_probe: config
                .root_probe
                .clone()
                .unwrap_or_else(|| ROOT_CHECK_SCRIPT.to_string()),
            transcript_dir: config.transcript_dir.clone(),
        }
    }

    pub fn with_root_mode(mut self, root_mode: bool) -> Self {
        self.root_mode = root_mode;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_command_timeout(mut self, command_timeout: Option<Duration>) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    pub fn with_verify_root_on_start(mut self, verify: bool) -> Self {
        self.verify_root_on_start = verify;
        self
    }

    pub fn with_root_probe(mut self, probe: impl Into<String>) -> Self {
        self.root_probe = probe.into();
        self
    }

    pub fn with_transcript_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transcript_dir = Some(dir.into());
        self
    }
}

/// A persistent, optionally elevated shell with a synchronous command API
pub struct KeepShell {
    spawner: Arc<dyn ShellSpawner>,
    options: KeepShellOptions,
    current: Mutex<Option<Arc<ShellSession>>>,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for KeepShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepShell")
            .field("spawner", &self.spawner.spawner_name())
            .field("options", &self.options)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl KeepShell {
    pub fn new(spawner: Arc<dyn ShellSpawner>, options: KeepShellOptions) -> Self {
        Self {
            spawner,
            options,
            current: Mutex::new(None),
            state: Mutex::new(SessionState::NoSession),
        }
    }

    /// Shell with a [`CommandSpawner`] and options taken from `config`
    pub fn from_config(config: &ShellConfig) -> Self {
        let spawner = CommandSpawner::new(ShellLauncher::from_config(config));
        Self::new(Arc::new(spawner), KeepShellOptions::from_config(config))
    }

    pub fn options(&self) -> &KeepShellOptions {
        &self.options
    }

    pub fn root_mode(&self) -> bool {
        self.options.root_mode
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// True when no command is running on the current session
    pub fn is_idle(&self) -> bool {
        !matches!(self.state(), SessionState::Busy | SessionState::Starting)
    }

    /// Run `command` and return its trimmed output, or `"error"` on any failure
    pub fn do_cmd_sync(&self, command: &str) -> String {
        match self.try_do_cmd(command) {
            Ok(output) => output,
            Err(e) => {
                log::warn!(
                    target: "keep_shell",
                    "Command '{}' failed: {}",
                    command_preview(command, 80),
                    e
                );
                ERROR_SENTINEL.to_string()
            }
        }
    }

    /// Run `command` with the configured per-command deadline
    pub fn try_do_cmd(&self, command: &str) -> Result<String, ShellError> {
        self.try_do_cmd_with_timeout(command, self.options.command_timeout)
    }

    /// Run `command`, waiting at most `timeout` for its end marker
    pub fn try_do_cmd_with_timeout(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<String, ShellError> {
        let lock_timeout = self.options.lock_timeout;
        let mut recoveries = 0;

        loop {
            if self.recover_stale_lock() {
                recoveries += 1;
            }
            if recoveries >= MAX_ACQUIRE_ATTEMPTS {
                return Err(ShellError::LockTimeout(lock_timeout));
            }
            let session = self.ensure_session()?;

            let Some(mut io) = session.io.try_lock_for(lock_timeout) else {
                // A holder still inside its time budget is just slow
                if !session.lock_age().map_or(false, |age| age > lock_timeout) {
                    log::debug!(
                        target: "keep_shell",
                        "Still waiting for session {}",
                        session.id()
                    );
                    continue;
                }

                recoveries += 1;
                log::warn!(
                    target: "keep_shell",
                    "Session {} held for more than {:?}, restarting it (attempt {}/{})",
                    session.id(),
                    lock_timeout,
                    recoveries,
                    MAX_ACQUIRE_ATTEMPTS
                );
                self.discard(&session);
                continue;
            };

            // Destroyed while we were queued
            if !session.is_alive() {
                continue;
            }

            session.enter();
            self.set_state(SessionState::Busy);
            log::debug!(
                target: "keep_shell",
                "[session {}] {}",
                session.id(),
                command_preview(command, 120)
            );

            let result = session.exec_framed(&mut io, command, timeout);
            let alive = session.leave();
            // Still under the I/O lock so the next holder's Busy is not overwritten
            if alive && result.is_ok() {
                self.set_state_if_current(&session, SessionState::Idle);
            }
            drop(io);

            if result.is_err() {
                self.discard(&session);
            }
            return result;
        }
    }

    /// Run `command` and pass its output through `translation`
    pub fn do_cmd_sync_translated(&self, command: &str, translation: &ShellTranslation) -> String {
        translation.get_translated_result(command, self)
    }

    /// Run `command` and translate each output line into text or image items
    pub fn do_cmd_outputs(&self, command: &str, translation: &ShellTranslation) -> Vec<ShellOutput> {
        let output = self.do_cmd_sync(command);
        let rows: Vec<&str> = output.split('\n').collect();
        translation.resolve_lines(&rows)
    }

    /// Destroy the current session; the next command starts a new one
    pub fn try_exit(&self) {
        let session = self.current.lock().take();
        if let Some(session) = session {
            log::debug!(target: "keep_shell", "Exiting session {}", session.id());
            session.destroy();
        }
        *self.state.lock() = SessionState::NoSession;
    }

    /// Run the privilege probe on a throwaway session
    ///
    /// Unlike [`check_root`](Self::check_root) this tells a missing
    /// elevation tool apart from a refusal.
    pub fn probe_root(&self) -> RootStatus {
        let process = match self.spawner.spawn(true) {
            Ok(process) => process,
            Err(e) => {
                log::warn!(target: "keep_shell", "Elevation tool unavailable: {:#}", e);
                return RootStatus::Unavailable;
            }
        };

        let session = match ShellSession::open(next_session_id(), process, None) {
            Ok(session) => session,
            Err(e) => {
                log::warn!(target: "keep_shell", "Probe session failed: {}", e);
                return RootStatus::Unavailable;
            }
        };

        let answer = {
            let mut io = session.io.lock();
            session.exec_framed(&mut io, &self.options.root_probe, Some(self.options.lock_timeout))
        };
        session.destroy();

        match answer {
            Ok(answer) => classify_root_response(&answer),
            Err(e) => {
                log::debug!(target: "keep_shell", "Root probe did not answer: {}", e);
                RootStatus::Denied
            }
        }
    }

    /// Kill the current session if its command has outlived the lock timeout
    fn recover_stale_lock(&self) -> bool {
        let stale = {
            let current = self.current.lock();
            current
                .as_ref()
                .filter(|session| {
                    session
                        .lock_age()
                        .map_or(false, |age| age > self.options.lock_timeout)
                })
                .cloned()
        };

        if let Some(session) = stale {
            log::warn!(
                target: "keep_shell",
                "Session {} lock is stale, destroying it",
                session.id()
            );
            self.discard(&session);
            return true;
        }
        false
    }

    /// Current live session, starting one if needed
    fn ensure_session(&self) -> Result<Arc<ShellSession>, ShellError> {
        let mut current = self.current.lock();
        if let Some(session) = current.take() {
            if session.is_alive() && !session.has_exited() {
                *current = Some(Arc::clone(&session));
                return Ok(session);
            }
            log::info!(target: "keep_shell", "Session {} is gone, starting a new one", session.id());
            session.destroy();
        }

        self.set_state(SessionState::Starting);
        match self.start_session() {
            Ok(session) => {
                *current = Some(Arc::clone(&session));
                self.set_state(SessionState::Idle);
                Ok(session)
            }
            Err(e) => {
                log::error!(target: "keep_shell", "Failed to start shell: {}", e);
                self.set_state(SessionState::Failed);
                Err(e)
            }
        }
    }

    fn start_session(&self) -> Result<Arc<ShellSession>, ShellError> {
        let elevated = self.options.root_mode;
        let process = self
            .spawner
            .spawn(elevated)
            .map_err(|e| ShellError::Spawn(format!("{:#}", e)))?;

        let id = next_session_id();
        let session = ShellSession::open(id, process, self.open_transcript(id))?;
        log::debug!(
            target: "keep_shell",
            "Started session {} (elevated: {})",
            id,
            elevated
        );

        if elevated && self.options.verify_root_on_start {
            let answer = {
                let mut io = session.io.lock();
                session.exec_framed(&mut io, &self.options.root_probe, Some(self.options.lock_timeout))
            };
            match answer {
                Ok(answer) if classify_root_response(&answer).is_granted() => {}
                Ok(answer) => {
                    session.destroy();
                    return Err(ShellError::PrivilegeDenied(answer));
                }
                Err(e) => {
                    session.destroy();
                    return Err(e);
                }
            }
        }

        Ok(session)
    }

    fn open_transcript(&self, id: u64) -> Option<Transcript> {
        let dir = self.options.transcript_dir.as_ref()?;
        match SessionLogger::new(id, dir) {
            Ok(logger) => Some(logger.shared()),
            Err(e) => {
                log::warn!(target: "keep_shell", "Transcript disabled: {:#}", e);
                None
            }
        }
    }

    /// Destroy `session`, forgetting it if it is still the current one
    fn discard(&self, session: &Arc<ShellSession>) {
        let was_current = {
            let mut current = self.current.lock();
            match *current {
                Some(ref existing) if Arc::ptr_eq(existing, session) => {
                    *current = None;
                    true
                }
                _ => false,
            }
        };

        session.destroy();
        if was_current {
            self.set_state(SessionState::NoSession);
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    fn set_state_if_current(&self, session: &Arc<ShellSession>, state: SessionState) {
        let current = self.current.lock();
        if current
            .as_ref()
            .map_or(false, |existing| Arc::ptr_eq(existing, session))
        {
            self.set_state(state);
        }
    }
}

impl CommandExecutor for KeepShell {
    fn do_cmd_sync(&self, command: &str) -> String {
        KeepShell::do_cmd_sync(self, command)
    }
}

impl Drop for KeepShell {
    fn drop(&mut self) {
        self.try_exit();
    }
}

fn next_session_id() -> u64 {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}
