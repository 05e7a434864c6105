pub mod commands;
pub mod repl;
pub mod setup;

pub use commands::{run_check_root, run_command, run_script, run_stream};
pub use repl::run_repl_mode;
pub use setup::{setup_from_cli, AppContext};
