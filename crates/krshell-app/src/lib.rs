pub mod app;
pub mod cli;

pub use app::{setup_from_cli, AppContext};
pub use cli::{Cli, Commands};
