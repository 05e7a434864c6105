//! Core types and structures for krshell
//!
//! This crate provides the foundational types shared by the shell session,
//! translation and script crates.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Marker echoed by the shell right before a command's output
pub const START_TAG: &str = "|SH>>|";

/// Marker echoed by the shell right after a command's output
pub const END_TAG: &str = "|<<SH|";

/// Value returned by `do_cmd_sync` when the command could not be completed
pub const ERROR_SENTINEL: &str = "error";

/// How long a session lock may be held before the next caller treats it as stale
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Session State
// ============================================================================

/// Lifecycle state of a persistent shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NoSession,
    Starting,
    Idle,
    Busy,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::NoSession => write!(f, "no_session"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Idle => write!(f, "idle"),
            SessionState::Busy => write!(f, "busy"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a privilege probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootStatus {
    /// The probe answered with the success token
    Granted,
    /// A shell was started but the probe reported no privilege
    Denied,
    /// The elevation tool could not be started at all
    Unavailable,
}

impl RootStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, RootStatus::Granted)
    }
}

// ============================================================================
// Shell Output
// ============================================================================

/// One translated line of shell output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellOutput {
    Text(String),
    Image {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        caption: Option<String>,
    },
}

impl ShellOutput {
    pub fn text(text: impl Into<String>) -> Self {
        ShellOutput::Text(text.into())
    }

    pub fn image(path: impl Into<String>, caption: Option<String>) -> Self {
        ShellOutput::Image {
            path: path.into(),
            caption,
        }
    }

    /// Text content, `None` for images
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ShellOutput::Text(text) => Some(text),
            ShellOutput::Image { .. } => None,
        }
    }
}

/// Join the text items of a translated output, skipping images
pub fn join_text(outputs: &[ShellOutput]) -> String {
    outputs
        .iter()
        .filter_map(ShellOutput::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Async Shell Events
// ============================================================================

/// Notifications emitted by the streaming shell unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ShellEvent {
    /// Process spawn finished; `false` when the shell could not be started
    Started(bool),
    /// A non-empty stdout line
    Output(String),
    /// A non-empty stderr line
    Error(String),
    /// Writing a command to stdin failed
    ExecFailed(String),
    /// The process terminated; `true` for a zero exit status
    Exited(bool),
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised inside the shell core
///
/// None of these cross into UI callers: `do_cmd_sync` turns every variant
/// into [`ERROR_SENTINEL`].
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to spawn shell: {0}")]
    Spawn(String),
    #[error("root privilege denied: {0}")]
    PrivilegeDenied(String),
    #[error("shell transport failure: {0}")]
    Transport(#[from] std::io::Error),
    #[error("shell output closed before the end marker ({} bytes received)", .partial.len())]
    Closed { partial: String },
    #[error("command did not finish within {0:?}")]
    Timeout(Duration),
    #[error("session lock could not be acquired within {0:?}")]
    LockTimeout(Duration),
}

// ============================================================================
// Executor Seam
// ============================================================================

/// Anything that can run a shell command synchronously and hand back its output
///
/// Translators and script helpers receive their executor through this trait
/// instead of reaching for a shared default shell.
pub trait CommandExecutor: Send + Sync {
    fn do_cmd_sync(&self, command: &str) -> String;
}
