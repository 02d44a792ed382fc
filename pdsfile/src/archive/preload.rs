use std::collections::BTreeSet;
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::archive::resolve::{self, physical_root, remember, ResolveError};
use crate::archive::{metadata, Archive};
use crate::common::category::Category;
use crate::common::memo::Memo;
use crate::file::PdsFile;

/// What a preload pass cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadSummary {
    pub roots: usize,
    /// Categories present on at least one disk.
    pub categories: usize,
    pub volsets: usize,
    pub volumes: usize,
    /// Entries that failed classification and were skipped.
    pub skipped: usize,
    /// Whether the shared batch lock was held for the whole pass.
    pub locked: bool,
}

/// 按固定类别顺序遍历所有磁盘，缓存到卷这一层为止。
pub(crate) fn preload(archive: &Archive) -> Result<PreloadSummary, ResolveError> {
    let batch = archive.cache().batch();
    let roots = archive.holdings_roots();
    let mut summary = PreloadSummary {
        roots: roots.len(),
        locked: batch.is_blocked(),
        ..Default::default()
    };
    if !summary.locked {
        warn!("Preloading without the cache batch lock");
    }

    let mut category_names = Vec::new();
    for category in Category::preload_order() {
        let dir_name = category.dir_name();
        let mut union = BTreeSet::new();
        let mut found = false;

        for root in &roots {
            if !root.holdings.join(&dir_name).is_dir() {
                continue;
            }
            found = true;
            let category_node = resolve::child(archive, &physical_root(root), &dir_name)?;
            let names = metadata::childnames(archive, &category_node);
            for name in &names {
                preload_volset(archive, &category_node, name, &mut summary);
            }
            union.extend(names);
        }

        if found {
            debug!("Preloaded {} ({} volume sets)", dir_name, union.len());
            remember(archive, PdsFile::virtual_category(category, union.into_iter().collect()));
            category_names.push(dir_name);
            summary.categories += 1;
        }
    }

    let mut root = PdsFile::virtual_root();
    root.childnames = Memo::filled(category_names);
    remember(archive, root);

    drop(batch);
    info!(
        "Preload cached {} categories, {} volume sets and {} volumes from {} root(s)",
        summary.categories, summary.volsets, summary.volumes, summary.roots
    );
    Ok(summary)
}

fn preload_volset(archive: &Archive, category: &PdsFile, name: &str, summary: &mut PreloadSummary) {
    let volset = match resolve::child(archive, category, name) {
        Ok(volset) => volset,
        Err(e) => {
            warn!("Skipping '{}/{}': {}", category.logical_path, name, e);
            summary.skipped += 1;
            return;
        }
    };
    summary.volsets += 1;
    if volset.is_mirror_file() || !metadata::isdir(archive, &volset) {
        return;
    }

    for volname in metadata::childnames(archive, &volset) {
        match resolve::child(archive, &volset, &volname) {
            Ok(_) => summary.volumes += 1,
            Err(e) => {
                warn!("Skipping '{}/{}': {}", volset.logical_path, volname, e);
                summary.skipped += 1;
            }
        }
    }
}
