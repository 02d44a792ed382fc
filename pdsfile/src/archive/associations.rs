use std::path::PathBuf;
use chrono::{DateTime, Utc};
use tracing::info;
use crate::archive::resolve::{is_index_table, ResolveError};
use crate::archive::Archive;
use crate::common::category::Category;
use crate::common::constants::{
    ARCHIVE_FILE_SUFFIX, CHECKSUM_FILE_SUFFIX, HOLDINGS_DIR, INDEX_SHELF, INFO_SHELF, LOGS_DIR, SHELF_EXT, SHELVES_DIR,
};
use crate::file::{Depth, PdsFile};
use crate::shelf::{scan_volume_info, write_info_shelf};
use crate::utils::glob::{expand_logical, is_pattern};
use crate::utils::path::join_logical;
use crate::utils::time::log_timestamp;

fn not_a_volume(node: &PdsFile) -> ResolveError {
    ResolveError::NotAVolume(node.logical_path.clone())
}

/// The disk a node lives on; virtual nodes use the first disk.
fn disk_of(archive: &Archive, node: &PdsFile) -> Result<PathBuf, ResolveError> {
    match &node.disk_root {
        Some(disk) => Ok(disk.clone()),
        None => archive
            .holdings_roots()
            .into_iter()
            .next()
            .map(|root| root.disk_root)
            .ok_or(ResolveError::NoHoldings),
    }
}

fn require_volset(node: &PdsFile) -> Result<Category, ResolveError> {
    match node.category {
        Some(category) if node.depth >= Depth::Volset && !node.volset_id.is_empty() => Ok(category),
        _ => Err(not_a_volume(node)),
    }
}

fn require_volume(node: &PdsFile) -> Result<Category, ResolveError> {
    match node.category {
        Some(category) if node.depth >= Depth::Volume && !node.volname.is_empty() => Ok(category),
        _ => Err(not_a_volume(node)),
    }
}

// --- 镜像路径 ---

/// Path of the checksum or archive file that mirrors `node` in `target`.
///
/// - `checksums-archives-<vt>/<volset><_vt>_md5.txt`
/// - `checksums-<vt>/<volset>/<volname><_vt>_md5.txt`
/// - `archives-<vt>/<volset>/<volname><_vt>.tar.gz`
fn mirror_path(archive: &Archive, node: &PdsFile, target: Category) -> Result<PathBuf, ResolveError> {
    let holdings = disk_of(archive, node)?.join(HOLDINGS_DIR);
    let dir = holdings.join(target.dir_name());
    let voltype = target.voltype.file_suffix();

    if target.checksums && target.archives {
        require_volset(node)?;
        return Ok(dir.join(format!("{}{}{}", node.volset_dir(), voltype, CHECKSUM_FILE_SUFFIX)));
    }
    require_volume(node)?;
    let ext = if target.checksums { CHECKSUM_FILE_SUFFIX } else { ARCHIVE_FILE_SUFFIX };
    Ok(dir.join(node.volset_dir()).join(format!("{}{}{}", node.volname, voltype, ext)))
}

/// Prefix stripped from paths listed inside a mirror file: the volume-set
/// directory of the node's own category.
fn skip_prefix(archive: &Archive, node: &PdsFile, category: Category) -> Result<PathBuf, ResolveError> {
    Ok(disk_of(archive, node)?
        .join(HOLDINGS_DIR)
        .join(category.dir_name())
        .join(node.volset_dir()))
}

pub(crate) fn checksum_path_and_skip(archive: &Archive, node: &PdsFile) -> Result<(PathBuf, PathBuf), ResolveError> {
    let category = node.category.ok_or_else(|| not_a_volume(node))?;
    if category.checksums {
        return Err(not_a_volume(node));
    }
    let path = mirror_path(archive, node, category.with_checksums())?;
    Ok((path, skip_prefix(archive, node, category)?))
}

pub(crate) fn archive_path_and_skip(archive: &Archive, node: &PdsFile) -> Result<(PathBuf, PathBuf), ResolveError> {
    let category = node.category.ok_or_else(|| not_a_volume(node))?;
    if category.is_mirror() {
        return Err(not_a_volume(node));
    }
    let path = mirror_path(archive, node, category.with_archives())?;
    Ok((path, skip_prefix(archive, node, category)?))
}

// --- 日志路径 ---

fn log_root(archive: &Archive, node: &PdsFile, dir: &str) -> Result<PathBuf, ResolveError> {
    let root = match &archive.config.log_root {
        Some(root) => root.clone(),
        None => disk_of(archive, node)?.join(LOGS_DIR),
    };
    Ok(join_logical(&root, dir))
}

/// `<stem>[_<id>]_<timestamp>[_<task>].log`
fn log_name(stem: &str, id: &str, task: &str, time: DateTime<Utc>) -> String {
    let mut name = stem.to_string();
    if !id.is_empty() {
        name.push('_');
        name.push_str(id);
    }
    name.push('_');
    name.push_str(&log_timestamp(time));
    if !task.is_empty() {
        name.push('_');
        name.push_str(task);
    }
    name.push_str(".log");
    name
}

pub(crate) fn log_path_for_volume(
    archive: &Archive,
    node: &PdsFile,
    id: &str,
    task: &str,
    dir: &str,
    time: DateTime<Utc>,
) -> Result<PathBuf, ResolveError> {
    let category = require_volume(node)?;
    Ok(log_root(archive, node, dir)?
        .join(category.dir_name())
        .join(node.volset_dir())
        .join(log_name(&node.volname, id, task, time)))
}

pub(crate) fn log_path_for_volset(
    archive: &Archive,
    node: &PdsFile,
    id: &str,
    task: &str,
    dir: &str,
    time: DateTime<Utc>,
) -> Result<PathBuf, ResolveError> {
    let category = require_volset(node)?;
    Ok(log_root(archive, node, dir)?
        .join(category.dir_name())
        .join(log_name(&node.volset_dir(), id, task, time)))
}

// --- 跨类别关联 ---

pub(crate) fn associated_abspaths(
    archive: &Archive,
    node: &PdsFile,
    target: Category,
    must_exist: bool,
    primary_only: bool,
) -> Result<Vec<PathBuf>, ResolveError> {
    let roots = archive.holdings_paths();

    if target.is_mirror() {
        let path = mirror_path(archive, node, target)?;
        if !must_exist {
            return Ok(vec![path]);
        }
        // 镜像文件可能位于其他磁盘
        let holdings = disk_of(archive, node)?.join(HOLDINGS_DIR);
        let logical = path.strip_prefix(&holdings).map(|p| p.to_string_lossy().replace('\\', "/"));
        return Ok(match logical {
            Ok(logical) => roots
                .iter()
                .map(|root| join_logical(root, &logical))
                .filter(|candidate| candidate.exists())
                .take(1)
                .collect(),
            Err(_) => Vec::new(),
        });
    }

    let rules = archive.bundle(node).associations_for(target.voltype);
    let patterns = if primary_only {
        rules.first(&node.logical_path).unwrap_or_default()
    } else {
        rules.all_flat(&node.logical_path)
    };

    let mut found: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let hits = expand_logical(&roots, &pattern, true)?;
        if hits.is_empty() && !must_exist && !is_pattern(&pattern) {
            found.push(join_logical(&disk_of(archive, node)?.join(HOLDINGS_DIR), &pattern));
        }
        for hit in hits {
            if !found.contains(&hit.abspath) {
                found.push(hit.abspath);
            }
        }
    }
    Ok(found)
}

// --- Shelf 路径 ---

fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..name_start + dot],
        _ => path,
    }
}

/// Shelf file and record key for `node` in table `table_id`.
///
/// - index rows: `shelves/index/<cat>/<volset>/<volname>/<table stem>_index.shelf`, keyed by row name
/// - archive mirrors: `shelves/<id>/<cat>/<volset>_<id>.shelf`, keyed by file name
/// - everything else: `shelves/<id>/<cat>/<volset>/<volname>_<id>.shelf`, keyed by interior path
pub(crate) fn shelf_path_and_key(archive: &Archive, node: &PdsFile, table_id: &str) -> Result<(PathBuf, String), ResolveError> {
    let shelves = disk_of(archive, node)?.join(SHELVES_DIR);

    if table_id == INDEX_SHELF {
        let (table, key) = if node.is_index_row {
            let table = node.interior.rsplit_once('/').map_or("", |(table, _)| table);
            (table, node.basename.clone())
        } else if is_index_table(node) {
            (node.interior.as_str(), String::new())
        } else {
            return Err(ResolveError::NotAnIndexTable(node.logical_path.clone()));
        };
        let category = require_volume(node)?;
        let dir = shelves
            .join(INDEX_SHELF)
            .join(category.dir_name())
            .join(node.volset_dir())
            .join(&node.volname);
        let file = format!("{}_{}{}", strip_extension(table), INDEX_SHELF, SHELF_EXT);
        return Ok((join_logical(&dir, &file), key));
    }

    let category = require_volset(node)?;
    if category.archives && !category.checksums {
        let key = if node.depth == Depth::Volume { node.basename.clone() } else { String::new() };
        let path = shelves
            .join(table_id)
            .join(category.dir_name())
            .join(format!("{}_{}{}", node.volset_dir(), table_id, SHELF_EXT));
        return Ok((path, key));
    }

    require_volume(node)?;
    let path = shelves
        .join(table_id)
        .join(category.dir_name())
        .join(node.volset_dir())
        .join(format!("{}_{}{}", node.volname, table_id, SHELF_EXT));
    Ok((path, node.interior.clone()))
}

/// Rebuilds the `info` shelf of a volume directory.
pub(crate) fn build_info_shelf(archive: &Archive, volume: &PdsFile) -> Result<(PathBuf, usize), ResolveError> {
    if volume.depth != Depth::Volume || volume.is_mirror_file() {
        return Err(not_a_volume(volume));
    }
    let dir = volume.abspath.as_ref().ok_or_else(|| not_a_volume(volume))?;
    let records = scan_volume_info(dir)?;
    let (path, _) = shelf_path_and_key(archive, volume, INFO_SHELF)?;
    let count = write_info_shelf(&path, &records)?;
    // 旧句柄和摘要可能已过期
    archive.shelves().close_all();
    info!("Rebuilt info shelf for '{}'", volume.logical_path);
    Ok((path, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use chrono::TimeZone;
    use tempfile::TempDir;
    use crate::archive::ArchiveConfig;
    use crate::common::category::Voltype;

    fn setup(dirs: &[&str], files: &[&str]) -> (TempDir, Archive) {
        let tmp = TempDir::new().unwrap();
        let holdings = tmp.path().join("d1/holdings");
        for dir in dirs {
            fs::create_dir_all(holdings.join(dir)).unwrap();
        }
        for file in files {
            fs::write(holdings.join(file), b"x").unwrap();
        }
        let mut config = ArchiveConfig::with_holdings([holdings]);
        config.case_insensitive = Some(false);
        let archive = Archive::new(config).unwrap();
        (tmp, archive)
    }

    #[test]
    fn test_checksum_and_archive_paths() {
        let (tmp, archive) = setup(&["previews/ABC_1xxx_v2/ABC_1001/DATA", "archives-volumes/ABC_1xxx"], &[]);
        let holdings = tmp.path().join("d1/holdings");

        let data = archive.from_logical_path("previews/ABC_1xxx_v2/ABC_1001/DATA", true).unwrap();
        let (path, skip) = archive.checksum_path_and_skip(&data).unwrap();
        assert_eq!(path, holdings.join("checksums-previews/ABC_1xxx_v2/ABC_1001_previews_md5.txt"));
        assert_eq!(skip, holdings.join("previews/ABC_1xxx_v2"));

        let (path, skip) = archive.archive_path_and_skip(&data).unwrap();
        assert_eq!(path, holdings.join("archives-previews/ABC_1xxx_v2/ABC_1001_previews.tar.gz"));
        assert_eq!(skip, holdings.join("previews/ABC_1xxx_v2"));

        let archives = archive.from_logical_path("archives-volumes/ABC_1xxx", true).unwrap();
        let (path, _) = archive.checksum_path_and_skip(&archives).unwrap();
        assert_eq!(path, holdings.join("checksums-archives-volumes/ABC_1xxx_md5.txt"));
        assert!(matches!(archive.archive_path_and_skip(&archives), Err(ResolveError::NotAVolume(_))));

        let volset = archive.from_logical_path("previews/ABC_1xxx_v2", true).unwrap();
        assert!(matches!(archive.checksum_path_and_skip(&volset), Err(ResolveError::NotAVolume(_))));
    }

    #[test]
    fn test_log_paths() {
        let (tmp, archive) = setup(&["volumes/ABC_1xxx/ABC_1001"], &[]);
        let time = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let volume = archive.from_logical_path("volumes/ABC_1xxx/ABC_1001", true).unwrap();

        let path = archive.log_path_for_volume_at(&volume, "md5", "validate", "checks", time).unwrap();
        assert_eq!(
            path,
            tmp.path().join("d1/logs/checks/volumes/ABC_1xxx/ABC_1001_md5_2024-03-05T07-08-09_validate.log")
        );

        let path = archive.log_path_for_volset_at(&volume, "", "", "", time).unwrap();
        assert_eq!(path, tmp.path().join("d1/logs/volumes/ABC_1xxx_2024-03-05T07-08-09.log"));
    }

    #[test]
    fn test_associated_previews() {
        let (tmp, archive) = setup(
            &["volumes/ABC_1xxx/ABC_1001/DATA", "previews/ABC_1xxx/ABC_1001/DATA"],
            &[
                "volumes/ABC_1xxx/ABC_1001/DATA/F1.IMG",
                "previews/ABC_1xxx/ABC_1001/DATA/F1_thumb.jpg",
                "previews/ABC_1xxx/ABC_1001/DATA/F1_full.png",
                "previews/ABC_1xxx/ABC_1001/DATA/F2_thumb.jpg",
            ],
        );
        let previews = tmp.path().join("d1/holdings/previews/ABC_1xxx/ABC_1001");
        let image = archive.from_logical_path("volumes/ABC_1xxx/ABC_1001/DATA/F1.IMG", true).unwrap();

        let primary = archive
            .associated_abspaths(&image, Category::plain(Voltype::Previews), true, true)
            .unwrap();
        assert_eq!(primary, vec![previews.join("DATA/F1_full.png"), previews.join("DATA/F1_thumb.jpg")]);

        let all = archive
            .associated_abspaths(&image, Category::plain(Voltype::Previews), true, false)
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2], previews);

        let checksum = archive
            .associated_abspaths(&image, Category::plain(Voltype::Volumes).with_checksums(), false, false)
            .unwrap();
        assert_eq!(checksum, vec![tmp.path().join("d1/holdings/checksums-volumes/ABC_1xxx/ABC_1001_md5.txt")]);
        assert!(archive
            .associated_abspaths(&image, Category::plain(Voltype::Volumes).with_checksums(), true, false)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_shelf_paths() {
        let (tmp, archive) = setup(
            &["volumes/ABC_1xxx/ABC_1001/INDEX", "archives-volumes/ABC_1xxx"],
            &["volumes/ABC_1xxx/ABC_1001/INDEX/INDEX.TAB", "archives-volumes/ABC_1xxx/ABC_1001.tar.gz"],
        );
        let shelves = tmp.path().join("d1/shelves");

        let table = archive.from_logical_path("volumes/ABC_1xxx/ABC_1001/INDEX/INDEX.TAB", true).unwrap();
        let (path, key) = archive.shelf_path_and_key(&table, INFO_SHELF).unwrap();
        assert_eq!(path, shelves.join("info/volumes/ABC_1xxx/ABC_1001_info.shelf"));
        assert_eq!(key, "INDEX/INDEX.TAB");

        let row = archive.child(&table, "F1").unwrap();
        assert!(row.is_index_row);
        let (path, key) = archive.shelf_path_and_key(&row, INDEX_SHELF).unwrap();
        assert_eq!(path, shelves.join("index/volumes/ABC_1xxx/ABC_1001/INDEX/INDEX_index.shelf"));
        assert_eq!(key, "F1");

        let tarball = archive.from_logical_path("archives-volumes/ABC_1xxx/ABC_1001.tar.gz", true).unwrap();
        let (path, key) = archive.shelf_path_and_key(&tarball, INFO_SHELF).unwrap();
        assert_eq!(path, shelves.join("info/archives-volumes/ABC_1xxx_info.shelf"));
        assert_eq!(key, "ABC_1001.tar.gz");

        assert!(matches!(
            archive.shelf_path_and_key(&tarball, INDEX_SHELF),
            Err(ResolveError::NotAnIndexTable(_))
        ));
    }

    #[test]
    fn test_build_info_shelf() {
        let (_tmp, archive) = setup(&["volumes/ABC_1xxx/ABC_1001/DATA"], &["volumes/ABC_1xxx/ABC_1001/DATA/F1.IMG"]);
        let volume = archive.from_logical_path("volumes/ABC_1xxx/ABC_1001", true).unwrap();
        let (path, count) = archive.build_info_shelf(&volume).unwrap();
        assert!(path.is_file());
        assert_eq!(count, 3);

        let file = archive.from_logical_path("volumes/ABC_1xxx/ABC_1001/DATA/F1.IMG", true).unwrap();
        let record: crate::shelf::ShelfRecord = archive.shelf_lookup(&file, INFO_SHELF).unwrap().unwrap();
        assert_eq!(record.bytes, 1);
    }
}
