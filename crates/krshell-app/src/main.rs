use anyhow::Result;
use clap::{CommandFactory, Parser};

use krshell::app::{run_check_root, run_command, run_repl_mode, run_script, run_stream};
use krshell::{setup_from_cli, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Some(shell) = cli.generate {
        clap_complete::generate(shell, &mut Cli::command(), "krshell", &mut std::io::stdout());
        return Ok(());
    }

    krshell_logging::init_logging(cli.verbose);

    let ctx = setup_from_cli(&cli)?;

    let result = match cli.command.clone().unwrap_or(Commands::Repl) {
        Commands::Run {
            command,
            translate,
            json,
        } => run_command(&ctx, &command, translate, json),
        Commands::CheckRoot => run_check_root(&ctx),
        Commands::Stream { command } => run_stream(&ctx, &command).await,
        Commands::Script { file, page_config } => {
            run_script(&ctx, &file, page_config.as_deref()).await
        }
        Commands::Repl => run_repl_mode(&ctx),
    };

    ctx.registry.destroy_all();
    result
}
