//! Functions for printing holdings nodes to the console.

use std::path::PathBuf;
use serde::Serialize;
use pdsfile::iter::Step;
use pdsfile::PreloadSummary;
use crate::errors::CliError;
use crate::handlers::list::ListEntry;
use crate::handlers::paths::MirrorPath;
use crate::handlers::resolve::NodeReport;
use crate::handlers::versions::VersionRow;
use crate::ui::formatter::{colorize_string, depth_color, format_size};

/// 以缩进 JSON 打印任意结果
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 打印单个节点的详细信息
pub fn print_node(report: &NodeReport) {
    println!("----------------------------------------");
    let title = if report.logical_path.is_empty() { "/" } else { report.logical_path.as_str() };
    println!("  Path:            {}", colorize_string(title, depth_color(report.depth)));
    println!("  URL:             {}", report.url);
    match &report.abspath {
        Some(path) => println!("  Location:        {}", path.display()),
        None => println!("  Location:        (virtual)"),
    }
    println!("  Depth:           {:?}", report.depth);
    if let Some(category) = &report.category {
        println!("  Category:        {}", category);
    }
    if !report.volset_id.is_empty() {
        println!("  Volume set:      {}", report.volset_id);
        println!("  Version:         {} (rank {})", report.version, report.rank);
    }
    if !report.volname.is_empty() {
        println!("  Volume:          {}", report.volname);
    }
    println!("  Dataset:         {}", report.dataset);
    println!("  Exists:          {}", report.exists);
    if report.exists && !report.isdir {
        println!("  Size:            {}", format_size(report.size_bytes));
    }
    if !report.modtime.is_empty() {
        println!("  Modified:        {}", report.modtime);
    }
    if !report.description.is_empty() {
        println!("  Description:     {}", report.description);
    }
    println!("----------------------------------------");
}

/// 打印目录列表，目录以 `/` 结尾
pub fn print_listing(entries: &[ListEntry]) {
    for entry in entries {
        if entry.isdir {
            println!("{:<12} {}", "--[dir]--", colorize_string(&format!("{}/", entry.name), "blue"));
        } else {
            println!("{:<12} {:<32} {}", format_size(entry.size_bytes), entry.name, entry.description);
        }
    }
}

pub fn print_versions(rows: &[VersionRow]) {
    for row in rows {
        println!("{:>7}  {:<28} {}", row.rank, row.message, row.logical_path);
    }
}

pub fn print_paths(paths: &[PathBuf]) {
    for path in paths {
        println!("{}", path.display());
    }
}

pub fn print_mirror_path(mirror: &MirrorPath) {
    println!("{}", mirror.path.display());
    println!("  skip: {}", mirror.skip.display());
}

/// 打印遍历步骤，跨目录的跳转用 `>` 标记
pub fn print_steps(steps: &[Step]) {
    for step in steps {
        let marker = if step.jump_level > 0 { ">" } else { " " };
        println!("{} {}", marker, step.display_path);
    }
}

pub fn print_preload(summary: &PreloadSummary) {
    println!(
        "Preloaded {} root(s): {} categories, {} volume sets, {} volumes ({} skipped)",
        summary.roots, summary.categories, summary.volsets, summary.volumes, summary.skipped
    );
    if !summary.locked {
        println!("{}", colorize_string("Warning: the cache batch lock was not held.", "yellow"));
    }
}
