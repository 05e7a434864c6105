//! Script environment for menu scripts
//!
//! Every script runs through an executor wrapper that sets up the toolkit
//! environment. Inline scripts are cached on disk by content hash first.

pub mod environment;
pub mod files;
pub mod page;
pub mod runner;

pub use environment::{render_executor, ScriptEnvironment};
pub use page::PageContext;
pub use runner::ScriptRun;

/// Prefix of script and page references bundled with the application
pub const ASSETS_PREFIX: &str = "file:///android_asset/";
