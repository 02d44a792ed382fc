use std::path::PathBuf;
use serde::Serialize;
use pdsfile::Archive;
use crate::errors::CliError;

/// 镜像文件路径以及打包/校验时要去掉的前缀
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorPath {
    pub path: PathBuf,
    pub skip: PathBuf,
}

pub fn handle_checksum_path(archive: &Archive, path: &str) -> Result<MirrorPath, CliError> {
    let node = archive.from_path(path, false)?;
    let (path, skip) = archive.checksum_path_and_skip(&node)?;
    Ok(MirrorPath { path, skip })
}

pub fn handle_archive_path(archive: &Archive, path: &str) -> Result<MirrorPath, CliError> {
    let node = archive.from_path(path, false)?;
    let (path, skip) = archive.archive_path_and_skip(&node)?;
    Ok(MirrorPath { path, skip })
}

pub fn handle_log_path(archive: &Archive, path: &str, id: &str, task: &str, dir: &str, volset: bool) -> Result<PathBuf, CliError> {
    let node = archive.from_path(path, false)?;
    let log = if volset {
        archive.log_path_for_volset(&node, id, task, dir)?
    } else {
        archive.log_path_for_volume(&node, id, task, dir)?
    };
    Ok(log)
}
