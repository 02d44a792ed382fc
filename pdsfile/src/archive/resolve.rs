use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use crate::archive::{metadata, Archive, HoldingsRoot};
use crate::cache::CacheError;
use crate::common::category::{Category, Voltype};
use crate::common::constants::{ARCHIVE_FILE_SUFFIX, CHECKSUM_FILE_SUFFIX, HOLDINGS_DIR};
use crate::common::memo::Memo;
use crate::common::version::{version_info, VersionError};
use crate::file::{Depth, PdsFile, SegmentKind};
use crate::shelf::ShelfError;
use crate::utils::path::{normalize_logical, split_holdings};

/// Defines errors that can occur while resolving a path to a node.
//
// // 定义将路径解析为节点时可能发生的错误。
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The path does not exist on any holdings root.
    //
    // // 路径在任何 holdings 根目录下都不存在。
    #[error("Path not found: {0}")]
    NotFound(String),

    /// A segment does not have the form its depth requires.
    //
    // // 某个路径段不符合其所在层级要求的格式。
    #[error("Invalid {kind} name: '{name}'")]
    Malformed { kind: SegmentKind, name: String },

    /// The release suffix of a volume set is not recognized.
    //
    // // 无法识别卷集的版本后缀。
    #[error("Invalid release suffix: {0}")]
    Version(#[from] VersionError),

    /// An absolute path has no `holdings` segment.
    //
    // // 绝对路径中没有 `holdings` 段。
    #[error("Path is not inside a '{HOLDINGS_DIR}' directory: {0}")]
    OutsideHoldings(PathBuf),

    /// No holdings roots are configured.
    //
    // // 未配置任何 holdings 根目录。
    #[error("No holdings roots are configured")]
    NoHoldings,

    /// The operation needs a node at or below a volume (or volume set).
    //
    // // 该操作需要位于卷（或卷集）层级或以下的节点。
    #[error("Not inside a volume: '{0}'")]
    NotAVolume(String),

    /// An index-shelf lookup was asked of something that is not an index
    /// table or one of its rows.
    //
    // // 对非索引表（或其行）执行了索引 shelf 查询。
    #[error("Not an index table or row: '{0}'")]
    NotAnIndexTable(String),

    /// A cache backend failed mid-operation.
    //
    // // 缓存后端在操作过程中失败。
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Reading a shelf file failed.
    //
    // // 读取 shelf 文件失败。
    #[error("Shelf error: {0}")]
    Shelf(#[from] ShelfError),

    /// An association pattern is not a valid glob.
    //
    // // 关联规则生成的模式不是合法的 glob。
    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    /// An I/O error occurred.
    //
    // // 发生 I/O 错误。
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn malformed(kind: SegmentKind, name: &str) -> ResolveError {
    ResolveError::Malformed { kind, name: name.to_string() }
}

// --- 缓存辅助 ---

pub(crate) fn cached_by_abspath(archive: &Archive, path: &Path) -> Option<Arc<PdsFile>> {
    archive.cache().get_by_abspath(path).unwrap_or_else(|e| {
        warn!("Cache lookup for {:?} failed: {}", path, e);
        None
    })
}

pub(crate) fn cached_by_logical(archive: &Archive, logical: &str) -> Option<Arc<PdsFile>> {
    archive.cache().get_by_logical(logical).unwrap_or_else(|e| {
        warn!("Cache lookup for '{}' failed: {}", logical, e);
        None
    })
}

/// Offers a node to the cache and returns it shared.
pub(crate) fn remember(archive: &Archive, node: PdsFile) -> Arc<PdsFile> {
    let node = Arc::new(node);
    if let Err(e) = archive.cache().insert(Arc::clone(&node)) {
        warn!("Failed to cache '{}': {}", node.logical_path, e);
    }
    node
}

/// Only existing nodes are cached, so a later creation is never hidden by
/// a stale negative entry.
fn remember_if_exists(archive: &Archive, node: PdsFile) -> Arc<PdsFile> {
    if metadata::exists(archive, &node) {
        remember(archive, node)
    } else {
        Arc::new(node)
    }
}

fn require_exists(archive: &Archive, node: Arc<PdsFile>, must_exist: bool) -> Result<Arc<PdsFile>, ResolveError> {
    if must_exist && !metadata::exists(archive, &node) {
        let shown = match &node.abspath {
            Some(path) => path.display().to_string(),
            None => node.logical_path.clone(),
        };
        return Err(ResolveError::NotFound(shown));
    }
    Ok(node)
}

// --- 根节点 ---

/// The root directory of one disk. Never cached: the logical key of the
/// root belongs to the virtual root.
pub(crate) fn physical_root(root: &HoldingsRoot) -> PdsFile {
    PdsFile {
        abspath: Some(root.holdings.clone()),
        disk_root: Some(root.disk_root.clone()),
        url_prefix: root.url_prefix.clone(),
        is_virtual: false,
        exists: Memo::new(),
        isdir: Memo::new(),
        ..PdsFile::virtual_root()
    }
}

pub(crate) fn virtual_root(archive: &Archive) -> Arc<PdsFile> {
    cached_by_logical(archive, "").unwrap_or_else(|| Arc::new(PdsFile::virtual_root()))
}

pub(crate) fn walk(archive: &Archive, root: &HoldingsRoot, logical: &str) -> Result<Arc<PdsFile>, ResolveError> {
    let mut node = Arc::new(physical_root(root));
    for segment in logical.split('/').filter(|s| !s.is_empty()) {
        node = child(archive, &node, segment)?;
    }
    Ok(node)
}

// --- 解析入口 ---

pub(crate) fn from_abspath(archive: &Archive, path: &Path, must_exist: bool) -> Result<Arc<PdsFile>, ResolveError> {
    // 去掉末尾的斜杠和 `.` 段
    let path: PathBuf = path.components().collect();
    if let Some(node) = cached_by_abspath(archive, &path) {
        return require_exists(archive, node, must_exist);
    }

    let (_, holdings, logical) = split_holdings(&path).ok_or_else(|| ResolveError::OutsideHoldings(path.clone()))?;
    let root = archive.root_for(&holdings);
    let node = walk(archive, &root, &logical)?;
    require_exists(archive, node, must_exist)
}

pub(crate) fn from_logical_path(archive: &Archive, path: &str, must_exist: bool) -> Result<Arc<PdsFile>, ResolveError> {
    let logical = normalize_logical(path);
    if logical.is_empty() {
        return Ok(virtual_root(archive));
    }
    if let Some(node) = cached_by_logical(archive, &logical) {
        return require_exists(archive, node, must_exist);
    }

    let roots = archive.holdings_roots();
    let mut fallback = None;
    for root in &roots {
        let node = walk(archive, root, &logical)?;
        if metadata::exists(archive, &node) {
            return Ok(node);
        }
        fallback.get_or_insert(node);
    }

    let node = fallback.ok_or(ResolveError::NoHoldings)?;
    require_exists(archive, node, must_exist)
}

fn is_holdings_segment(segment: &str) -> bool {
    match (segment.get(..HOLDINGS_DIR.len()), segment.get(HOLDINGS_DIR.len()..)) {
        (Some(head), Some(tail)) => head.eq_ignore_ascii_case(HOLDINGS_DIR) && tail.chars().all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Interprets a user-supplied path.
///
/// Accepts absolute physical paths, URLs and `holdingsN/` prefixed paths,
/// logical paths with the category omitted (`volumes` is assumed), and bare
/// volume names whose volume set is inferred from the rules. A volume set
/// given without release suffix resolves to its highest-ranked release.
pub(crate) fn from_loose_path(archive: &Archive, text: &str, must_exist: bool) -> Result<Arc<PdsFile>, ResolveError> {
    let text = text.trim().replace('\\', "/");

    let physical = Path::new(&text);
    if physical.is_absolute() {
        if let Some((_, holdings, _)) = split_holdings(physical) {
            if holdings.is_dir() {
                return from_abspath(archive, physical, must_exist);
            }
        }
    }

    let all: Vec<&str> = text.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let start = all.iter().position(|s| is_holdings_segment(s)).map_or(0, |i| i + 1);
    let mut segments: Vec<String> = all[start..].iter().map(|s| s.to_string()).collect();
    if segments.is_empty() {
        return Ok(virtual_root(archive));
    }

    let patterns = archive.patterns();
    match Category::parse(&segments[0]) {
        Some(category) => segments[0] = category.dir_name(),
        None if patterns.volset(&segments[0]).is_some() || patterns.volname(&segments[0]).is_some() => {
            segments.insert(0, Voltype::Volumes.as_str().to_string());
        }
        None => return Err(malformed(SegmentKind::Category, &segments[0])),
    }

    if segments.len() > 1 && patterns.volset(&segments[1]).is_none() && patterns.volname(&segments[1]).is_some() {
        let volset_id = archive
            .rules()
            .volset_for_volname(&segments[1])
            .ok_or_else(|| malformed(SegmentKind::VolumeSet, &segments[1]))?;
        debug!("Inferred volume set {} for {}", volset_id, segments[1]);
        segments.insert(1, volset_id);
    }

    if segments.len() > 1 {
        let unsuffixed = patterns
            .volset(&segments[1])
            .filter(|p| p.release_suffix.is_empty() && p.extension.is_empty() && p.voltype.is_none());
        if let Some(parts) = unsuffixed {
            if let Some(best) = best_volset_dir(archive, &segments[0], &parts.volset_id) {
                segments[1] = best;
            }
        }
    }

    from_logical_path(archive, &segments.join("/"), must_exist)
}

/// The on-disk volume-set directory with the highest rank for `volset_id`.
fn best_volset_dir(archive: &Archive, category_dir: &str, volset_id: &str) -> Option<String> {
    let patterns = archive.patterns();
    let mut best: Option<(u32, String)> = None;
    for holdings in archive.holdings_paths() {
        let Ok(entries) = std::fs::read_dir(holdings.join(category_dir)) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(parts) = patterns.volset(&name) else {
                continue;
            };
            if !parts.volset_id.eq_ignore_ascii_case(volset_id) || !parts.extension.is_empty() {
                continue;
            }
            let Ok(version) = version_info(&parts.release_suffix) else {
                continue;
            };
            if best.as_ref().is_none_or(|(rank, _)| version.rank > *rank) {
                best = Some((version.rank, name));
            }
        }
    }
    best.map(|(_, name)| name)
}

// --- 父子关系 ---

fn join_segment(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}

pub(crate) fn is_index_table(node: &PdsFile) -> bool {
    node.depth == Depth::Interior && !node.is_index_row && node.basename.to_ascii_lowercase().ends_with(".tab")
}

/// Resolves the entry `basename` inside `parent`, correcting its case to
/// the on-disk spelling.
pub(crate) fn child(archive: &Archive, parent: &PdsFile, basename: &str) -> Result<Arc<PdsFile>, ResolveError> {
    let name = basename.trim_matches('/');
    if name.contains('/') {
        let mut node = child(archive, parent, name.split('/').next().unwrap_or_default())?;
        for segment in name.split('/').skip(1).filter(|s| !s.is_empty()) {
            node = child(archive, &node, segment)?;
        }
        return Ok(node);
    }

    if parent.is_virtual {
        return from_logical_path(archive, &join_segment(&parent.logical_path, name), false);
    }

    let actual = match &parent.abspath {
        Some(dir) if !parent.is_index_row => archive
            .case_resolver()
            .resolve_child(dir, name)
            .unwrap_or_else(|| name.to_string()),
        _ => name.to_string(),
    };

    let abspath = parent.abspath.as_ref().map(|dir| dir.join(&actual));
    if let Some(path) = &abspath {
        if let Some(hit) = cached_by_abspath(archive, path) {
            return Ok(hit);
        }
    }
    // 逻辑键可能属于另一块磁盘或虚拟节点，只接受同一物理位置的命中
    if let Some(hit) = cached_by_logical(archive, &join_segment(&parent.logical_path, &actual)) {
        if !hit.is_virtual && hit.abspath == abspath {
            return Ok(hit);
        }
    }

    let node = classify(archive, parent, &actual, abspath)?;
    Ok(remember_if_exists(archive, node))
}

fn classify(archive: &Archive, parent: &PdsFile, name: &str, abspath: Option<PathBuf>) -> Result<PdsFile, ResolveError> {
    if parent.is_index_row || parent.is_mirror_file() {
        return Err(ResolveError::NotFound(join_segment(&parent.logical_path, name)));
    }

    let mut node = PdsFile {
        basename: name.to_string(),
        abspath,
        logical_path: join_segment(&parent.logical_path, name),
        is_virtual: false,
        permanent: false,
        is_index_row: false,
        exists: Memo::new(),
        isdir: Memo::new(),
        childnames: Memo::new(),
        info: Memo::new(),
        split: Memo::new(),
        ..parent.clone()
    };
    let patterns = archive.patterns();

    match (parent.depth, parent.category) {
        (Depth::Root, _) => {
            node.category = Some(patterns.category(name).ok_or_else(|| malformed(SegmentKind::Category, name))?);
            node.depth = Depth::Category;
            node.permanent = true;
        }
        (Depth::Category, Some(category)) => {
            let parts = patterns.volset(name).ok_or_else(|| malformed(SegmentKind::VolumeSet, name))?;
            let valid = if category.checksums && category.archives {
                parts.extension == CHECKSUM_FILE_SUFFIX
            } else {
                parts.extension.is_empty() && parts.voltype.is_none()
            };
            if !valid {
                return Err(malformed(SegmentKind::VolumeSet, name));
            }
            node.version = version_info(&parts.release_suffix)?;
            node.dataset = archive.rules().for_volset(&parts.volset_id).name.clone();
            node.volset_id = parts.volset_id;
            node.release_suffix = parts.release_suffix;
            node.depth = Depth::Volset;
        }
        (Depth::Volset, Some(category)) => {
            let parts = patterns.volname(name).ok_or_else(|| malformed(SegmentKind::VolumeName, name))?;
            let valid = match (category.checksums, category.archives) {
                (true, false) => parts.extension == CHECKSUM_FILE_SUFFIX,
                (false, true) => parts.extension == ARCHIVE_FILE_SUFFIX,
                _ => parts.extension.is_empty() && parts.voltype.is_none(),
            };
            if !valid {
                return Err(malformed(SegmentKind::VolumeName, name));
            }
            node.volname = parts.volname;
            node.depth = Depth::Volume;
        }
        (Depth::Volume | Depth::Interior, Some(_)) => {
            if is_index_table(parent) {
                node.is_index_row = true;
                node.isdir = Memo::filled(false);
            }
            node.interior = join_segment(&parent.interior, name);
            node.depth = Depth::Interior;
        }
        (_, None) => return Err(malformed(SegmentKind::Category, &parent.basename)),
    }
    Ok(node)
}

/// The parent directory, or `None` for the root and for categories.
pub(crate) fn parent(archive: &Archive, node: &PdsFile) -> Result<Option<Arc<PdsFile>>, ResolveError> {
    let Some(identity) = node.parent_identity() else {
        return Ok(None);
    };
    let hit = match &identity.abspath {
        Some(path) => cached_by_abspath(archive, path),
        None => cached_by_logical(archive, &identity.logical_path),
    };
    Ok(Some(match hit {
        Some(hit) => hit,
        None => remember_if_exists(archive, identity),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use crate::archive::ArchiveConfig;

    fn archive_with(dirs: &[&str]) -> (TempDir, Archive) {
        let tmp = TempDir::new().unwrap();
        for dir in dirs {
            fs::create_dir_all(tmp.path().join("d1/holdings").join(dir)).unwrap();
        }
        let mut config = ArchiveConfig::with_holdings([tmp.path().join("d1/holdings")]);
        config.case_insensitive = Some(false);
        let archive = Archive::new(config).unwrap();
        (tmp, archive)
    }

    #[test]
    fn test_holdings_segment() {
        assert!(is_holdings_segment("holdings"));
        assert!(is_holdings_segment("Holdings2"));
        assert!(!is_holdings_segment("holdingsX"));
        assert!(!is_holdings_segment("hold"));
    }

    #[test]
    fn test_classification_errors() {
        let (_tmp, archive) = archive_with(&["volumes/ABC_1xxx/ABC_1001"]);
        let err = archive.from_logical_path("bogus", false).unwrap_err();
        assert!(matches!(err, ResolveError::Malformed { kind: SegmentKind::Category, .. }));

        let err = archive.from_logical_path("volumes/not-a-volset", false).unwrap_err();
        assert!(matches!(err, ResolveError::Malformed { kind: SegmentKind::VolumeSet, .. }));

        let err = archive.from_logical_path("volumes/ABC_1xxx/README", false).unwrap_err();
        assert!(matches!(err, ResolveError::Malformed { kind: SegmentKind::VolumeName, .. }));

        let err = archive.from_logical_path("volumes/ABC_1xxx_v1.2.3.4", false).unwrap_err();
        assert!(matches!(err, ResolveError::Malformed { .. }));
    }

    #[test]
    fn test_must_exist() {
        let (_tmp, archive) = archive_with(&["volumes/ABC_1xxx/ABC_1001"]);
        assert!(archive.from_logical_path("volumes/ABC_1xxx/ABC_1001", true).is_ok());
        let err = archive.from_logical_path("volumes/ABC_1xxx/ABC_1002", true).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
        let ghost = archive.from_logical_path("volumes/ABC_1xxx/ABC_1002", false).unwrap();
        assert_eq!(ghost.depth, Depth::Volume);
        assert!(!archive.exists(&ghost));
    }

    #[test]
    fn test_outside_holdings() {
        let (tmp, archive) = archive_with(&[]);
        let err = archive.from_abspath(&tmp.path().join("elsewhere/x"), false).unwrap_err();
        assert!(matches!(err, ResolveError::OutsideHoldings(_)));
    }

    #[test]
    fn test_loose_paths() {
        let (_tmp, archive) = archive_with(&[
            "volumes/ABC_1xxx_v1/ABC_1001",
            "volumes/ABC_1xxx_prelim/ABC_1001",
        ]);

        let node = archive.from_path("ABC_1001", true).unwrap();
        assert_eq!(node.logical_path, "volumes/ABC_1xxx_prelim/ABC_1001");

        let node = archive.from_path("https://pds.example.org/holdings2/volumes/ABC_1xxx_v1", true).unwrap();
        assert_eq!(node.logical_path, "volumes/ABC_1xxx_v1");

        let node = archive.from_path("Volumes\\abc_1xxx_V1\\abc_1001", true).unwrap();
        assert_eq!(node.logical_path, "volumes/ABC_1xxx_v1/ABC_1001");

        assert!(archive.from_path("nonsense/path", false).is_err());
    }

    #[test]
    fn test_mirror_files_classify_at_volume_depth() {
        let (tmp, archive) = archive_with(&["checksums-volumes/ABC_1xxx", "checksums-archives-volumes"]);
        let holdings = tmp.path().join("d1/holdings");
        fs::write(holdings.join("checksums-volumes/ABC_1xxx/ABC_1001_md5.txt"), "").unwrap();
        fs::write(holdings.join("checksums-archives-volumes/ABC_1xxx_md5.txt"), "").unwrap();

        let file = archive.from_logical_path("checksums-volumes/ABC_1xxx/ABC_1001_md5.txt", true).unwrap();
        assert_eq!(file.depth, Depth::Volume);
        assert_eq!(file.volname, "ABC_1001");
        assert!(file.is_mirror_file());
        assert!(matches!(archive.child(&file, "x"), Err(ResolveError::NotFound(_))));

        let file = archive.from_logical_path("checksums-archives-volumes/ABC_1xxx_md5.txt", true).unwrap();
        assert_eq!(file.depth, Depth::Volset);
        assert_eq!(file.volset_id, "ABC_1xxx");
    }

    #[test]
    fn test_parent_of_category_is_none() {
        let (_tmp, archive) = archive_with(&["volumes/ABC_1xxx/ABC_1001/DATA"]);
        let data = archive.from_logical_path("volumes/ABC_1xxx/ABC_1001/DATA", true).unwrap();
        let volume = archive.parent(&data).unwrap().unwrap();
        assert_eq!(volume.logical_path, "volumes/ABC_1xxx/ABC_1001");
        let volset = archive.parent(&volume).unwrap().unwrap();
        let category = archive.parent(&volset).unwrap().unwrap();
        assert_eq!(category.logical_path, "volumes");
        assert!(archive.parent(&category).unwrap().is_none());
    }

    #[test]
    fn test_child_reuses_node_cached_by_logical_key() {
        let (_tmp, archive) = archive_with(&["volumes/ABC_1xxx/ABC_1001"]);
        let volume = archive.from_logical_path("volumes/ABC_1xxx/ABC_1001", true).unwrap();
        let volset = archive.parent(&volume).unwrap().unwrap();
        let abspath = volume.abspath.clone().unwrap();

        archive.cache().forget_abspath(&abspath).unwrap();
        assert!(archive.cache().get_by_abspath(&abspath).unwrap().is_none());

        let again = archive.child(&volset, "ABC_1001").unwrap();
        assert!(Arc::ptr_eq(&again, &volume));
    }
}
