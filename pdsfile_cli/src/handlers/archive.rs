use std::path::{Path, PathBuf};
use pdsfile::{Archive, PreloadSummary};
use tracing::debug;
use crate::errors::CliError;

pub fn handle_open(config: &Path) -> Result<Archive, CliError> {
    let archive = Archive::open(config)?;
    debug!("Archive opened from {:?} with {} root(s)", config, archive.holdings_roots().len());
    Ok(archive)
}

pub fn handle_preload(archive: &Archive) -> Result<PreloadSummary, CliError> {
    Ok(archive.preload()?)
}

/// 重建卷的 info shelf，返回 shelf 路径和写入的记录数
pub fn handle_build_shelf(archive: &Archive, path: &str) -> Result<(PathBuf, usize), CliError> {
    let volume = archive.from_path(path, true)?;
    Ok(archive.build_info_shelf(&volume)?)
}
