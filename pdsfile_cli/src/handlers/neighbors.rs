use std::sync::Arc;
use pdsfile::iter::Step;
use pdsfile::{Archive, FileFilter, PdsFile};
use crate::errors::CliError;

pub fn build_filter(include: &[String], exclude: &[String]) -> Result<FileFilter, CliError> {
    let mut filter = FileFilter::new();
    if !include.is_empty() {
        filter = filter.include(include).map_err(|e| CliError::InvalidPattern(e.to_string()))?;
    }
    if !exclude.is_empty() {
        filter = filter.exclude(exclude).map_err(|e| CliError::InvalidPattern(e.to_string()))?;
    }
    Ok(filter)
}

/// 按节点类型选择迭代器：索引行、目录或文件
pub fn handle_neighbors(
    archive: &Archive,
    node: &PdsFile,
    reverse: bool,
    limit: Option<usize>,
    filter: FileFilter,
) -> Result<Vec<Step>, CliError> {
    let sign = if reverse { -1 } else { 1 };
    let limit = limit.unwrap_or(usize::MAX);

    let steps = if node.is_index_row {
        archive.row_iter(node)?.copy(sign).take(limit).collect()
    } else if archive.isdir(node) {
        archive.dir_iter(node)?.copy(sign).take(limit).collect()
    } else {
        archive.file_iter(node, filter)?.copy(sign).take(limit).collect()
    };
    Ok(steps)
}

/// 相邻的下一个 (或上一个) 节点；已到尽头时返回 None
pub fn step_once(archive: &Archive, node: &PdsFile, reverse: bool) -> Result<Option<Arc<PdsFile>>, CliError> {
    let steps = handle_neighbors(archive, node, reverse, Some(1), FileFilter::new())?;
    match steps.first() {
        Some(step) => Ok(Some(archive.from_logical_path(&step.logical_path, true)?)),
        None => Ok(None),
    }
}
