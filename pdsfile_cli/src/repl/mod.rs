pub mod dispatcher;
pub mod state;

use crate::cli::ReplCommand;
use crate::errors::CliError;
use crate::repl::dispatcher::handle_repl_command;
use crate::repl::state::AppState;
use clap::Parser;
use rustyline::DefaultEditor;
use tracing::debug;

pub fn run_repl(app_state: &mut AppState) -> Result<(), CliError> {
    let mut rl = DefaultEditor::new()?;

    while app_state.running {
        let prompt = format!("pdsfile[{}]> ", app_state.location());

        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = shlex::split(line.as_str()).unwrap_or_default();
                if args.is_empty() {
                    continue;
                }

                match ReplCommand::try_parse_from(args) {
                    Ok(command) => {
                        if let Err(e) = handle_repl_command(command, app_state) {
                            eprintln!("Error: {}", e);
                        }
                    }
                    Err(e) => {
                        e.print()?;
                    }
                }
            }
            Err(e) => {
                debug!("Input closed: {}", e);
                println!("\nGoodbye!");
                break;
            }
        }
    }
    debug!("Browse session ended at {}", app_state.location());
    Ok(())
}
