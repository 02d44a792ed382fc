use serde::Serialize;
use pdsfile::{Archive, PdsFile};
use crate::errors::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    pub name: String,
    pub isdir: bool,
    pub size_bytes: u64,
    pub description: String,
}

/// 列出目录 (或索引表) 的子节点
pub fn handle_ls(archive: &Archive, node: &PdsFile) -> Result<Vec<ListEntry>, CliError> {
    let names = archive.childnames(node);
    if names.is_empty() && !archive.isdir(node) {
        return Err(CliError::NotADirectory(node.logical_path.clone()));
    }

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let child = archive.child(node, &name)?;
        entries.push(ListEntry {
            isdir: archive.isdir(&child),
            size_bytes: archive.size_bytes(&child),
            description: archive.description(&child),
            name,
        });
    }
    Ok(entries)
}
