use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use krshell_script::{PageContext, ScriptEnvironment};
use krshell_session::{AsyncShellUnit, ShellLauncher};
use krshell_translation::{classify_log_line, LogLine};
use krshell_types::{RootStatus, ShellEvent};

use super::setup::AppContext;

/// `krshell run`
pub fn run_command(ctx: &AppContext, command: &str, translate: bool, json: bool) -> Result<()> {
    let shell = ctx.registry.default_instance();

    if json {
        let outputs = shell.do_cmd_outputs(command, &ctx.translation);
        println!("{}", serde_json::to_string_pretty(&outputs)?);
        return Ok(());
    }

    let output = shell.try_do_cmd(command)?;
    if translate {
        let rows: Vec<&str> = output.split('\n').collect();
        println!("{}", ctx.translation.resolve_rows(&rows));
    } else {
        println!("{}", output);
    }
    Ok(())
}

/// `krshell check-root`
pub fn run_check_root(ctx: &AppContext) -> Result<()> {
    let shell = ctx.registry.default_instance();
    match shell.probe_root() {
        RootStatus::Granted => println!("{} root access granted", "✓".bright_green()),
        RootStatus::Denied => println!("{} root access denied", "✗".bright_red()),
        RootStatus::Unavailable => println!(
            "{} '{}' could not be started",
            "!".bright_yellow(),
            ctx.config.su
        ),
    }
    Ok(())
}

/// `krshell stream`
pub async fn run_stream(ctx: &AppContext, command: &str) -> Result<()> {
    let (mut unit, mut rx) = AsyncShellUnit::channel(
        ShellLauncher::from_config(&ctx.config),
        ctx.config.root_mode,
    );

    unit.exec(command).await;
    let waiter = unit.wait_for(None);
    let success = print_events(&mut rx).await;

    if let Some(waiter) = waiter {
        waiter.await.context("Shell wait task failed")?;
    }
    if !success {
        anyhow::bail!("Command exited with an error");
    }
    Ok(())
}

/// `krshell script`
pub async fn run_script(ctx: &AppContext, file: &Path, page_config: Option<&str>) -> Result<()> {
    let script = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read script {}", file.display()))?;
    let environment = ScriptEnvironment::init(&ctx.config, &ctx.registry, ctx.translation.clone())?;
    let page = page_config.map(PageContext::from_file);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut run = environment.spawn_streaming(&script, page.as_ref(), tx).await?;
    let waiter = run.wait(None);

    let success = tokio::select! {
        success = print_events(&mut rx) => success,
        _ = tokio::signal::ctrl_c() => {
            println!("{}", "^C - Stopping script...".bright_yellow());
            let output = run.force_stop();
            if !output.is_empty() {
                println!("{}", output.bright_black());
            }
            false
        }
    };

    if let Some(waiter) = waiter {
        waiter.abort();
    }
    if !success {
        anyhow::bail!("Script did not finish successfully");
    }
    Ok(())
}

/// Print events until the shell exits; returns the exit outcome
async fn print_events(rx: &mut UnboundedReceiver<ShellEvent>) -> bool {
    while let Some(event) = rx.recv().await {
        match event {
            ShellEvent::Started(true) => {}
            ShellEvent::Started(false) => {
                eprintln!("{} Failed to start shell", "Error:".bright_red().bold());
            }
            ShellEvent::Output(line) => print_log_line(&line),
            ShellEvent::Error(line) => eprintln!("{}", line.red()),
            ShellEvent::ExecFailed(reason) => {
                eprintln!("{} {}", "Error:".bright_red().bold(), reason);
            }
            ShellEvent::Exited(success) => return success,
        }
    }
    false
}

fn print_log_line(line: &str) {
    match classify_log_line(line) {
        LogLine::Progress { current, .. } if current < 0 => {
            println!("{}", "[working...]".bright_cyan());
        }
        LogLine::Progress { current, total } => {
            println!("{}", format!("[{}/{}]", current, total).bright_cyan());
        }
        LogLine::Image { path } => println!("{} {}", "image:".bright_magenta(), path),
        LogLine::Text(text) => println!("{}", text),
    }
}
