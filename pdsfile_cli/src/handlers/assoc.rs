use std::path::PathBuf;
use pdsfile::{Archive, Category, PdsFile};
use crate::errors::CliError;

pub fn handle_assoc(
    archive: &Archive,
    node: &PdsFile,
    target: &str,
    primary_only: bool,
    allow_missing: bool,
) -> Result<Vec<PathBuf>, CliError> {
    let category = Category::parse(target).ok_or_else(|| CliError::InvalidCategory(target.to_string()))?;
    Ok(archive.associated_abspaths(node, category, !allow_missing, primary_only)?)
}
