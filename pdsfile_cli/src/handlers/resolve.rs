use std::path::PathBuf;
use serde::Serialize;
use pdsfile::{Archive, Depth, PdsFile};
use crate::errors::CliError;

/// 一个节点的身份与元数据
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReport {
    pub logical_path: String,
    pub abspath: Option<PathBuf>,
    pub url: String,
    pub depth: Depth,
    pub category: Option<String>,
    pub dataset: String,
    pub volset_id: String,
    pub volname: String,
    pub rank: u32,
    pub version: String,
    pub exists: bool,
    pub isdir: bool,
    pub size_bytes: u64,
    pub modtime: String,
    pub description: String,
}

pub fn node_report(archive: &Archive, node: &PdsFile) -> NodeReport {
    NodeReport {
        logical_path: node.logical_path.clone(),
        abspath: node.abspath.clone(),
        url: node.url(),
        depth: node.depth,
        category: node.category.map(|c| c.to_string()),
        dataset: node.dataset.clone(),
        volset_id: node.volset_id.clone(),
        volname: node.volname.clone(),
        rank: node.version.rank,
        version: node.version.message.clone(),
        exists: archive.exists(node),
        isdir: archive.isdir(node),
        size_bytes: archive.size_bytes(node),
        modtime: archive.modtime(node),
        description: archive.description(node),
    }
}

pub fn handle_resolve(archive: &Archive, path: &str, allow_missing: bool) -> Result<NodeReport, CliError> {
    let node = archive.from_path(path, !allow_missing)?;
    Ok(node_report(archive, &node))
}
