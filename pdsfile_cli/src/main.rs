mod cli;
pub mod errors;
mod handlers;
mod repl;
mod ui;

use crate::cli::{Cli, TopLevelCommands};
use crate::errors::CliError;
use crate::repl::run_repl;
use crate::repl::state::AppState;
use crate::ui::printer;
use clap::Parser;
use pdsfile::Archive;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// 日志写到 stderr；`--verbose` 优先，其次是 PDSFILE_LOG 和 RUST_LOG
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("PDSFILE_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let archive = handlers::archive::handle_open(&cli.config)?;
    let json = cli.json;

    match cli.command {
        TopLevelCommands::Resolve { path, allow_missing } => {
            let report = handlers::resolve::handle_resolve(&archive, &path, allow_missing)?;
            if json {
                printer::print_json(&report)?;
            } else {
                printer::print_node(&report);
            }
        }
        TopLevelCommands::Ls { path } => {
            let node = archive.from_path(path.as_deref().unwrap_or(""), true)?;
            let entries = handlers::list::handle_ls(&archive, &node)?;
            if json {
                printer::print_json(&entries)?;
            } else {
                printer::print_listing(&entries);
            }
        }
        TopLevelCommands::Versions { path } => {
            let node = archive.from_path(&path, true)?;
            let rows = handlers::versions::handle_versions(&archive, &node)?;
            if json {
                printer::print_json(&rows)?;
            } else {
                printer::print_versions(&rows);
            }
        }
        TopLevelCommands::Assoc { path, target, primary, allow_missing } => {
            let node = archive.from_path(&path, !allow_missing)?;
            let paths = handlers::assoc::handle_assoc(&archive, &node, &target, primary, allow_missing)?;
            if json {
                printer::print_json(&paths)?;
            } else {
                printer::print_paths(&paths);
            }
        }
        TopLevelCommands::ChecksumPath { path } => {
            let mirror = handlers::paths::handle_checksum_path(&archive, &path)?;
            print_mirror(&mirror, json)?;
        }
        TopLevelCommands::ArchivePath { path } => {
            let mirror = handlers::paths::handle_archive_path(&archive, &path)?;
            print_mirror(&mirror, json)?;
        }
        TopLevelCommands::LogPath { path, id, task, dir, volset } => {
            let log = handlers::paths::handle_log_path(&archive, &path, &id, &task, &dir, volset)?;
            if json {
                printer::print_json(&log)?;
            } else {
                println!("{}", log.display());
            }
        }
        TopLevelCommands::Preload => {
            let summary = handlers::archive::handle_preload(&archive)?;
            if json {
                printer::print_json(&summary)?;
            } else {
                printer::print_preload(&summary);
            }
        }
        TopLevelCommands::Neighbors { path, reverse, limit, include, exclude } => {
            let node = archive.from_path(&path, true)?;
            let filter = handlers::neighbors::build_filter(&include, &exclude)?;
            let steps = handlers::neighbors::handle_neighbors(&archive, &node, reverse, limit, filter)?;
            if json {
                printer::print_json(&steps)?;
            } else {
                printer::print_steps(&steps);
            }
        }
        TopLevelCommands::BuildShelf { path } => {
            let (shelf, count) = handlers::archive::handle_build_shelf(&archive, &path)?;
            println!("Wrote {} record(s) to {}", count, shelf.display());
        }
        TopLevelCommands::Browse { path } => {
            let start = archive.from_path(path.as_deref().unwrap_or(""), true)?;
            browse(archive, start)?;
        }
    }
    Ok(())
}

fn print_mirror(mirror: &handlers::paths::MirrorPath, json: bool) -> Result<(), CliError> {
    if json {
        printer::print_json(mirror)?;
    } else {
        printer::print_mirror_path(mirror);
    }
    Ok(())
}

fn browse(archive: Archive, start: std::sync::Arc<pdsfile::PdsFile>) -> Result<(), CliError> {
    println!("Browsing holdings. Type 'help' for commands or 'exit' to quit.");
    let mut app_state = AppState::new(archive, start);
    run_repl(&mut app_state)
}
