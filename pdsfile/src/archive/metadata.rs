use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use crate::archive::resolve::{self, ResolveError};
use crate::archive::Archive;
use crate::common::category::Category;
use crate::common::constants::{INDEX_SHELF, INFO_SHELF};
use crate::file::{Depth, PdsFile};
use crate::shelf::ShelfRecord;
use crate::utils::path::{is_hidden, join_logical};
use crate::utils::time::format_modtime;

// --- 文件系统状态 ---

pub(crate) fn exists(archive: &Archive, node: &PdsFile) -> bool {
    *node.exists.get_or_init(|| {
        if node.is_virtual {
            return true;
        }
        if node.is_index_row {
            return index_row_exists(archive, node);
        }
        node.abspath.as_ref().is_some_and(|path| path.exists())
    })
}

fn index_row_exists(archive: &Archive, node: &PdsFile) -> bool {
    match archive.shelf_lookup::<serde_json::Value>(node, INDEX_SHELF) {
        Ok(found) => found.is_some(),
        Err(e) => {
            debug!("Index row '{}' not checkable: {}", node.logical_path, e);
            false
        }
    }
}

pub(crate) fn isdir(_archive: &Archive, node: &PdsFile) -> bool {
    *node.isdir.get_or_init(|| {
        if node.is_virtual {
            return true;
        }
        if node.is_index_row {
            return false;
        }
        node.abspath.as_ref().is_some_and(|path| path.is_dir())
    })
}

fn read_names(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {:?}: {}", dir, e);
            return Vec::new();
        }
    };
    let mut names: Vec<String> = entries
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !is_hidden(name))
        .collect();
    names.sort();
    names
}

/// Sorted child names. Virtual directories list the union over every
/// holdings root; an index table lists its rows.
pub(crate) fn childnames(archive: &Archive, node: &PdsFile) -> Vec<String> {
    node.childnames.get_or_init(|| list_children(archive, node)).clone()
}

fn list_children(archive: &Archive, node: &PdsFile) -> Vec<String> {
    if node.is_virtual {
        let mut names = BTreeSet::new();
        for holdings in archive.holdings_paths() {
            names.extend(read_names(&join_logical(&holdings, &node.logical_path)));
        }
        if node.depth == Depth::Root {
            names.retain(|name| archive.patterns().category(name).is_some());
        }
        return names.into_iter().collect();
    }
    if node.is_index_row {
        return Vec::new();
    }
    if resolve::is_index_table(node) {
        return match archive.shelf_path_and_key(node, INDEX_SHELF) {
            Ok((path, _)) => archive.shelves().keys(&path).unwrap_or_else(|e| {
                warn!("No index rows for '{}': {}", node.logical_path, e);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
    }
    match &node.abspath {
        Some(path) if isdir(archive, node) => read_names(path),
        _ => Vec::new(),
    }
}

// --- Shelf 信息 ---

/// The node's `info` record. Falls back to a filesystem stat when the shelf
/// has no record for it.
pub(crate) fn info(archive: &Archive, node: &PdsFile) -> ShelfRecord {
    node.info.get_or_init(|| load_info(archive, node)).clone()
}

fn load_info(archive: &Archive, node: &PdsFile) -> ShelfRecord {
    if !node.is_virtual && !node.is_index_row && node.depth >= Depth::Volume {
        match archive.shelf_lookup::<ShelfRecord>(node, INFO_SHELF) {
            Ok(Some(record)) => return record,
            Ok(None) => debug!("No info record for '{}'", node.logical_path),
            Err(e) => warn!("Info shelf unavailable for '{}' ({}); using the filesystem", node.logical_path, e),
        }
    }
    stat_info(archive, node)
}

fn stat_info(archive: &Archive, node: &PdsFile) -> ShelfRecord {
    let mut record = ShelfRecord::default();
    if let Some(meta) = node.abspath.as_ref().and_then(|path| fs::metadata(path).ok()) {
        if !meta.is_dir() {
            record.bytes = meta.len();
        }
        if let Ok(modified) = meta.modified() {
            record.modtime = format_modtime(modified);
        }
    }
    if isdir(archive, node) {
        record.child_count = childnames(archive, node).len() as u64;
    }
    record
}

// --- 规则派生的属性 ---

pub(crate) fn split(archive: &Archive, node: &PdsFile) -> (String, String, String) {
    node.split
        .get_or_init(|| {
            archive
                .bundle(node)
                .split
                .first(&node.basename)
                .unwrap_or_else(|| (node.basename.clone(), String::new(), String::new()))
        })
        .clone()
}

pub(crate) fn description(archive: &Archive, node: &PdsFile) -> String {
    archive
        .bundle(node)
        .descriptions
        .first(&node.logical_path)
        .unwrap_or_else(|| {
            if isdir(archive, node) { "Directory" } else { "File" }.to_string()
        })
}

pub(crate) fn sort_key(archive: &Archive, node: &PdsFile) -> String {
    archive
        .bundle(node)
        .sort_key
        .first(&node.basename)
        .unwrap_or_else(|| node.basename.clone())
}

// --- 版本 ---

/// The rank-table key of a node: its category and its volume-set id or
/// volume name.
fn version_key(node: &PdsFile) -> Result<(Category, String), ResolveError> {
    let not_a_volume = || ResolveError::NotAVolume(node.logical_path.clone());
    let category = node.category.ok_or_else(not_a_volume)?;
    match node.depth {
        Depth::Volset => Ok((category, node.volset_id.clone())),
        Depth::Volume | Depth::Interior if !node.volname.is_empty() => Ok((category, node.volname.clone())),
        _ => Err(not_a_volume()),
    }
}

/// Resolves every release of the node's volume set on every root, which
/// records each of them in the rank tables.
fn discover_versions(archive: &Archive, node: &PdsFile, category: Category) {
    let category_dir = category.dir_name();
    let volume_dir = match node.depth {
        Depth::Volume => Some(node.basename.as_str()),
        Depth::Interior => Some(node.volname.as_str()),
        _ => None,
    };

    for root in archive.holdings_roots() {
        let Ok(category_node) = resolve::walk(archive, &root, &category_dir) else {
            continue;
        };
        for name in read_names(&root.holdings.join(&category_dir)) {
            let same_volset = archive
                .patterns()
                .volset(&name)
                .is_some_and(|parts| parts.volset_id.eq_ignore_ascii_case(&node.volset_id));
            if !same_volset {
                continue;
            }
            let volset = match resolve::child(archive, &category_node, &name) {
                Ok(volset) => volset,
                Err(e) => {
                    debug!("Skipping release '{}': {}", name, e);
                    continue;
                }
            };
            if let Some(volume_dir) = volume_dir {
                if let Err(e) = resolve::child(archive, &volset, volume_dir) {
                    debug!("Skipping volume '{}' in '{}': {}", volume_dir, name, e);
                }
            }
        }
    }
}

pub(crate) fn version_ranks(archive: &Archive, node: &PdsFile) -> Result<Vec<u32>, ResolveError> {
    let (category, name) = version_key(node)?;
    discover_versions(archive, node, category);
    Ok(archive.cache().ranks(&category.dir_name(), &name)?)
}

pub(crate) fn all_versions(archive: &Archive, node: &PdsFile) -> Result<Vec<Arc<PdsFile>>, ResolveError> {
    let (category, name) = version_key(node)?;
    let category_dir = category.dir_name();
    let tail = if node.depth == Depth::Interior { node.interior.as_str() } else { "" };

    let mut versions = Vec::new();
    for rank in version_ranks(archive, node)? {
        let Some(base) = archive.cache().vol_path(&category_dir, &name, rank)? else {
            continue;
        };
        let path = join_logical(&base, tail);
        if path.exists() {
            versions.push(resolve::from_abspath(archive, &path, true)?);
        }
    }
    Ok(versions)
}

pub(crate) fn current_version(archive: &Archive, node: &PdsFile) -> Result<Option<Arc<PdsFile>>, ResolveError> {
    Ok(all_versions(archive, node)?.pop())
}
