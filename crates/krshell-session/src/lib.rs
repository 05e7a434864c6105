//! Persistent and streaming shell sessions
//!
//! [`KeepShell`] keeps one interactive shell alive and runs commands on it
//! synchronously, cutting each command's output out of the shared stdout
//! with echoed markers. [`AsyncShellUnit`] streams a shell's output as
//! events instead.

pub mod async_unit;
pub mod framer;
pub mod keep_shell;
pub mod logger;
pub mod process;
pub mod registry;
pub mod root_check;
mod session;

pub use async_unit::{AsyncShellUnit, ExitContinuation};
pub use framer::{CommandEnvelope, FrameState, OutputFramer};
pub use keep_shell::{KeepShell, KeepShellOptions};
pub use logger::{SessionLogger, Transcript};
pub use process::{CommandSpawner, ProcessControl, ShellLauncher, ShellProcess, ShellSpawner};
pub use registry::ShellRegistry;
pub use root_check::{classify_root_response, ROOT_CHECK_SCRIPT};

/// Lock attempts per command before giving up with `LockTimeout`
pub const MAX_ACQUIRE_ATTEMPTS: usize = 3;
