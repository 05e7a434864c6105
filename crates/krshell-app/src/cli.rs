use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// CLI arguments for krshell
#[derive(Parser, Debug)]
#[command(name = "krshell")]
#[command(about = "Persistent root shell sessions with translated output")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the config file (default: ~/.krshell/config.toml)
    #[arg(long, value_name = "PATH", env = "KRSHELL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run shells without the elevation tool
    #[arg(long)]
    pub no_root: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// TOML resource table for @string/@dimen references
    #[arg(long, value_name = "PATH")]
    pub resources: Option<PathBuf>,

    /// Generate shell completions
    #[arg(long, value_enum)]
    pub generate: Option<Shell>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run one command on the persistent shell
    Run {
        /// Command line passed to the shell verbatim
        command: String,
        /// Resolve @string/@dimen references in the output
        #[arg(long)]
        translate: bool,
        /// Print translated output items as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check whether the shell has root privilege
    CheckRoot,
    /// Run a command on a streaming shell and print output as it arrives
    Stream {
        command: String,
    },
    /// Run a script file through the executor wrapper
    Script {
        file: PathBuf,
        /// Page configuration exported to the script
        #[arg(long, value_name = "PATH")]
        page_config: Option<String>,
    },
    /// Interactive prompt on the persistent shell
    Repl,
}
