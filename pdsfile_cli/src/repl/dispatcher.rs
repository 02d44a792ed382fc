use std::sync::Arc;
use pdsfile::PdsFile;
use crate::cli::ReplCommand;
use crate::errors::CliError;
use crate::handlers;
use crate::repl::state::AppState;
use crate::ui::printer;

/// REPL 命令处理器
pub fn handle_repl_command(command: ReplCommand, app_state: &mut AppState) -> Result<(), CliError> {
    match command {
        ReplCommand::Info { name } => {
            let node = target_node(app_state, name.as_deref())?;
            printer::print_node(&handlers::resolve::node_report(&app_state.archive, &node));
        }
        ReplCommand::Ls { name } => {
            let node = target_node(app_state, name.as_deref())?;
            let entries = handlers::list::handle_ls(&app_state.archive, &node)?;
            if entries.is_empty() {
                println!("(empty)");
            }
            printer::print_listing(&entries);
        }
        ReplCommand::Cd { target } => {
            // 也可以停在文件或索引行上，之后用 next/prev 遍历
            app_state.cwd = resolve_target(app_state, &target)?;
        }
        ReplCommand::Up => {
            let parent = app_state.archive.parent(&app_state.cwd)?.ok_or(CliError::AtRoot)?;
            app_state.cwd = parent;
        }
        ReplCommand::Next | ReplCommand::Prev => {
            let reverse = matches!(command, ReplCommand::Prev);
            match handlers::neighbors::step_once(&app_state.archive, &app_state.cwd, reverse)? {
                Some(node) => {
                    println!("-> {}", node.logical_path);
                    app_state.cwd = node;
                }
                None => println!("No more neighbors in that direction."),
            }
        }
        ReplCommand::Versions => {
            let rows = handlers::versions::handle_versions(&app_state.archive, &app_state.cwd)?;
            printer::print_versions(&rows);
        }
        ReplCommand::Assoc { target, primary } => {
            let paths = handlers::assoc::handle_assoc(&app_state.archive, &app_state.cwd, &target, primary, false)?;
            if paths.is_empty() {
                println!("No associated paths under '{}'.", target);
            }
            printer::print_paths(&paths);
        }
        ReplCommand::Exit => {
            println!("Goodbye!");
            app_state.running = false;
        }
    }
    Ok(())
}

/// 当前节点，或当前节点下名为 `name` 的子节点
fn target_node(app_state: &AppState, name: Option<&str>) -> Result<Arc<PdsFile>, CliError> {
    match name {
        Some(name) => resolve_target(app_state, name),
        None => Ok(Arc::clone(&app_state.cwd)),
    }
}

/// `..` 指父节点，以 `/` 开头或带 `:` 的按任意路径解析，其余按子节点名解析
fn resolve_target(app_state: &AppState, target: &str) -> Result<Arc<PdsFile>, CliError> {
    let archive = &app_state.archive;
    if target == ".." {
        return archive.parent(&app_state.cwd)?.ok_or(CliError::AtRoot);
    }
    if target == "/" {
        return Ok(archive.from_logical_path("", true)?);
    }
    if target.starts_with('/') || target.contains(':') {
        return Ok(archive.from_path(target, true)?);
    }

    let mut node = Arc::clone(&app_state.cwd);
    for part in target.split('/').filter(|p| !p.is_empty()) {
        node = archive.child(&node, part)?;
        if !archive.exists(&node) {
            return Err(pdsfile::ResolveError::NotFound(node.logical_path.clone()).into());
        }
    }
    Ok(node)
}
