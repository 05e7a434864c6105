use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use super::setup::AppContext;

/// Interactive prompt forwarding each line to the persistent shell
pub fn run_repl_mode(ctx: &AppContext) -> Result<()> {
    let shell = ctx.registry.default_instance();
    let mut rl = DefaultEditor::new()?;

    println!(
        "{} {}",
        "krshell".bright_cyan().bold(),
        "- /root, /state, /restart, exit".bright_black()
    );

    loop {
        let prompt = if shell.root_mode() { "#" } else { "$" };
        let readline = rl.readline(&format!("{} ", prompt.bright_green().bold()));

        match readline {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if line == "exit" || line == "quit" {
                    println!("{}", "Goodbye!".bright_cyan());
                    break;
                }

                if line == "/root" {
                    if shell.check_root() {
                        println!("{}", "root access granted".bright_green());
                    } else {
                        println!("{}", "root access denied".bright_red());
                    }
                    continue;
                }

                if line == "/state" {
                    println!("{}", shell.state().to_string().bright_black());
                    continue;
                }

                if line == "/restart" {
                    shell.try_exit();
                    println!("{}", "Shell session closed".bright_black());
                    continue;
                }

                match shell.try_do_cmd(line) {
                    Ok(output) => {
                        let rows: Vec<&str> = output.split('\n').collect();
                        let output = ctx.translation.resolve_rows(&rows);
                        if !output.is_empty() {
                            println!("{}", output);
                        }
                    }
                    Err(e) => eprintln!("{} {}", "Error:".bright_red().bold(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".bright_black());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".bright_cyan());
                break;
            }
            Err(err) => {
                eprintln!("{} {}", "Error:".bright_red().bold(), err);
                break;
            }
        }
    }

    shell.try_exit();
    Ok(())
}
