use serde::Serialize;
use pdsfile::{Archive, PdsFile};
use crate::errors::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRow {
    pub rank: u32,
    pub message: String,
    pub logical_path: String,
    pub url: String,
}

/// 从旧到新列出所有版本，最后一项是当前版本
pub fn handle_versions(archive: &Archive, node: &PdsFile) -> Result<Vec<VersionRow>, CliError> {
    Ok(archive
        .all_versions(node)?
        .iter()
        .map(|version| VersionRow {
            rank: version.version.rank,
            message: version.version.message.clone(),
            logical_path: version.logical_path.clone(),
            url: version.url(),
        })
        .collect())
}
