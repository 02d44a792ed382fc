use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use walkdir::{DirEntry, WalkDir};
use crate::shelf::{ShelfError, ShelfRecord, ShelfWriter};
use crate::utils::path::is_hidden;
use crate::utils::time::format_modtime;

/// Running totals of one directory: bytes, latest modification, entries.
type Totals = (u64, SystemTime, u64);

fn hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && is_hidden(&entry.file_name().to_string_lossy())
}

fn interior_key(volume_dir: &Path, path: &Path) -> String {
    path.strip_prefix(volume_dir)
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}

/// Walks a volume directory and builds one record per interior path.
///
/// Directories report the total size and latest modification time of their
/// contents. The record under `""` summarizes the whole volume. Dotfiles are
/// skipped, so `child_count` agrees with the node's child names. Checksums
/// are left empty.
pub fn scan_volume_info(volume_dir: &Path) -> Result<BTreeMap<String, ShelfRecord>, ShelfError> {
    let mut records = BTreeMap::new();
    let mut totals: HashMap<String, Totals> = HashMap::new();
    let volume_modified = fs::metadata(volume_dir)?.modified().unwrap_or(UNIX_EPOCH);

    // 子项先于目录本身返回，目录出现时其累计值已经完整
    let walker = WalkDir::new(volume_dir)
        .min_depth(1)
        .sort_by_file_name()
        .contents_first(true)
        .into_iter()
        .filter_entry(|e| !hidden(e));

    for entry in walker {
        let entry = entry?;
        let key = interior_key(volume_dir, entry.path());
        let modified = entry.metadata()?.modified().unwrap_or(UNIX_EPOCH);

        let (bytes, latest, child_count) = if entry.file_type().is_dir() {
            let (bytes, latest, count) = totals.remove(&key).unwrap_or((0, UNIX_EPOCH, 0));
            (bytes, latest.max(modified), count)
        } else {
            (entry.metadata()?.len(), modified, 0)
        };

        let parent = key.rsplit_once('/').map_or("", |(parent, _)| parent).to_string();
        let parent_totals = totals.entry(parent).or_insert((0, UNIX_EPOCH, 0));
        parent_totals.0 += bytes;
        parent_totals.1 = parent_totals.1.max(latest);
        parent_totals.2 += 1;

        records.insert(
            key,
            ShelfRecord {
                bytes,
                child_count,
                modtime: format_modtime(latest),
                ..Default::default()
            },
        );
    }

    let (bytes, latest, child_count) = totals.remove("").unwrap_or((0, UNIX_EPOCH, 0));
    records.insert(
        String::new(),
        ShelfRecord {
            bytes,
            child_count,
            modtime: format_modtime(latest.max(volume_modified)),
            ..Default::default()
        },
    );
    Ok(records)
}

/// Writes scanned records into a fresh shelf table at `shelf_path`.
pub fn write_info_shelf(shelf_path: &Path, records: &BTreeMap<String, ShelfRecord>) -> Result<usize, ShelfError> {
    let mut writer = ShelfWriter::create(shelf_path)?;
    let count = writer.put_all(records.iter().map(|(k, v)| (k.as_str(), v)))?;
    writer.finish()?;
    info!("Wrote {} records to {:?}", count, shelf_path);
    Ok(count)
}
