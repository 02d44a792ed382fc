use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use crate::cache::CacheManager;
use crate::common::category::Category;
use crate::file::{PdsFile, SegmentPatterns};
use crate::iter::{DirIterator, FileFilter, FileIterator, RowIterator};
use crate::rules::{RuleBundle, RuleRegistry};
use crate::shelf::{ShelfRecord, ShelfStore};
use crate::utils::path::PathCaseResolver;

pub mod config;
mod associations;
mod metadata;
mod open;
mod preload;
mod resolve;

pub use config::ArchiveConfig;
pub use open::OpenError;
pub use preload::PreloadSummary;
pub use resolve::ResolveError;

/// One mounted holdings directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingsRoot {
    /// Position in the disk list; defines the URL prefix.
    pub index: usize,
    /// The directory containing `holdings/`.
    pub disk_root: PathBuf,
    /// `<disk_root>/holdings`.
    pub holdings: PathBuf,
    pub url_prefix: String,
}

impl HoldingsRoot {
    pub(crate) fn new(index: usize, holdings: PathBuf) -> Self {
        let disk_root = holdings.parent().map(Path::to_path_buf).unwrap_or_default();
        let url_prefix = if index == 0 {
            "/holdings/".to_string()
        } else {
            format!("/holdings{}/", index + 1)
        };
        Self { index, disk_root, holdings, url_prefix }
    }
}

/// The entry point to a multi-disk holdings archive.
///
/// Owns the node cache, the shelf handle pool and the rule registry. All
/// path resolution and metadata access goes through an `Archive`; there is
/// no process-wide state. Build one with [`Archive::new`] or [`Archive::open`].
//
// // 多磁盘归档的入口。持有节点缓存、shelf 句柄池和规则注册表。
pub struct Archive {
    /// The configuration this archive was built from.
    pub config: ArchiveConfig,
    roots: RwLock<Vec<HoldingsRoot>>,
    patterns: SegmentPatterns,
    cache: CacheManager,
    shelves: ShelfStore,
    rules: RuleRegistry,
    case: Box<dyn PathCaseResolver>,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("roots", &*self.roots())
            .field("cache", &self.cache)
            .field("shelves", &self.shelves)
            .field("case", &self.case)
            .finish()
    }
}

impl Archive {
    // --- 构建与组件 ---

    pub fn new(config: ArchiveConfig) -> Result<Self, OpenError> {
        open::build_archive(config)
    }

    /// Reads a `pdsfile.json` file and builds the archive it describes.
    pub fn open(config_path: &Path) -> Result<Self, OpenError> {
        open::open_archive(config_path)
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn shelves(&self) -> &ShelfStore {
        &self.shelves
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn patterns(&self) -> &SegmentPatterns {
        &self.patterns
    }

    pub fn case_resolver(&self) -> &dyn PathCaseResolver {
        self.case.as_ref()
    }

    pub(crate) fn roots(&self) -> RwLockReadGuard<'_, Vec<HoldingsRoot>> {
        self.roots.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The mounted holdings roots, in disk order.
    pub fn holdings_roots(&self) -> Vec<HoldingsRoot> {
        self.roots().clone()
    }

    pub(crate) fn holdings_paths(&self) -> Vec<PathBuf> {
        self.roots().iter().map(|r| r.holdings.clone()).collect()
    }

    /// Returns the root for `holdings`, registering it with the next disk
    /// index if it is not mounted yet.
    pub(crate) fn root_for(&self, holdings: &Path) -> HoldingsRoot {
        if let Some(root) = self.roots().iter().find(|r| r.holdings == holdings) {
            return root.clone();
        }
        let mut roots = self.roots.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(root) = roots.iter().find(|r| r.holdings == holdings) {
            return root.clone();
        }
        let root = HoldingsRoot::new(roots.len(), holdings.to_path_buf());
        tracing::info!("Registered holdings root {:?} as {}", holdings, root.url_prefix);
        roots.push(root.clone());
        root
    }

    /// The rule bundle governing a node.
    pub fn bundle(&self, node: &PdsFile) -> &Arc<RuleBundle> {
        self.rules.bundle(&node.dataset)
    }

    /// Drops every cached node and closes all shelf handles.
    pub fn clear(&self) -> Result<(), crate::cache::CacheError> {
        self.shelves.close_all();
        self.cache.clear()
    }

    // --- 路径解析 ---

    pub fn from_abspath(&self, path: &Path, must_exist: bool) -> Result<Arc<PdsFile>, ResolveError> {
        resolve::from_abspath(self, path, must_exist)
    }

    pub fn from_logical_path(&self, path: &str, must_exist: bool) -> Result<Arc<PdsFile>, ResolveError> {
        resolve::from_logical_path(self, path, must_exist)
    }

    /// Best-effort resolution of a user-typed path, URL or bare volume name.
    pub fn from_path(&self, path: &str, must_exist: bool) -> Result<Arc<PdsFile>, ResolveError> {
        resolve::from_loose_path(self, path, must_exist)
    }

    pub fn child(&self, node: &PdsFile, basename: &str) -> Result<Arc<PdsFile>, ResolveError> {
        resolve::child(self, node, basename)
    }

    pub fn parent(&self, node: &PdsFile) -> Result<Option<Arc<PdsFile>>, ResolveError> {
        resolve::parent(self, node)
    }

    // --- 元数据 ---

    pub fn exists(&self, node: &PdsFile) -> bool {
        metadata::exists(self, node)
    }

    pub fn isdir(&self, node: &PdsFile) -> bool {
        metadata::isdir(self, node)
    }

    pub fn childnames(&self, node: &PdsFile) -> Vec<String> {
        metadata::childnames(self, node)
    }

    pub fn info(&self, node: &PdsFile) -> ShelfRecord {
        metadata::info(self, node)
    }

    pub fn size_bytes(&self, node: &PdsFile) -> u64 {
        self.info(node).bytes
    }

    pub fn modtime(&self, node: &PdsFile) -> String {
        self.info(node).modtime
    }

    pub fn checksum(&self, node: &PdsFile) -> String {
        self.info(node).checksum
    }

    /// `(anchor, suffix, extension)` of the basename.
    pub fn split(&self, node: &PdsFile) -> (String, String, String) {
        metadata::split(self, node)
    }

    pub fn anchor(&self, node: &PdsFile) -> String {
        self.split(node).0
    }

    pub fn description(&self, node: &PdsFile) -> String {
        metadata::description(self, node)
    }

    pub fn sort_key(&self, node: &PdsFile) -> String {
        metadata::sort_key(self, node)
    }

    /// Ranks of every release of this node's volume set or volume, ascending.
    pub fn version_ranks(&self, node: &PdsFile) -> Result<Vec<u32>, ResolveError> {
        metadata::version_ranks(self, node)
    }

    /// The same node in every release that contains it, lowest rank first.
    pub fn all_versions(&self, node: &PdsFile) -> Result<Vec<Arc<PdsFile>>, ResolveError> {
        metadata::all_versions(self, node)
    }

    pub fn current_version(&self, node: &PdsFile) -> Result<Option<Arc<PdsFile>>, ResolveError> {
        metadata::current_version(self, node)
    }

    // --- 关联路径 ---

    /// The checksum file covering this node's volume, and the path prefix
    /// its entries are relative to.
    pub fn checksum_path_and_skip(&self, node: &PdsFile) -> Result<(PathBuf, PathBuf), ResolveError> {
        associations::checksum_path_and_skip(self, node)
    }

    /// The archive file of this node's volume, and the prefix stripped from
    /// member names.
    pub fn archive_path_and_skip(&self, node: &PdsFile) -> Result<(PathBuf, PathBuf), ResolveError> {
        associations::archive_path_and_skip(self, node)
    }

    pub fn log_path_for_volume(&self, node: &PdsFile, id: &str, task: &str, dir: &str) -> Result<PathBuf, ResolveError> {
        associations::log_path_for_volume(self, node, id, task, dir, Utc::now())
    }

    pub fn log_path_for_volume_at(
        &self,
        node: &PdsFile,
        id: &str,
        task: &str,
        dir: &str,
        time: DateTime<Utc>,
    ) -> Result<PathBuf, ResolveError> {
        associations::log_path_for_volume(self, node, id, task, dir, time)
    }

    pub fn log_path_for_volset(&self, node: &PdsFile, id: &str, task: &str, dir: &str) -> Result<PathBuf, ResolveError> {
        associations::log_path_for_volset(self, node, id, task, dir, Utc::now())
    }

    pub fn log_path_for_volset_at(
        &self,
        node: &PdsFile,
        id: &str,
        task: &str,
        dir: &str,
        time: DateTime<Utc>,
    ) -> Result<PathBuf, ResolveError> {
        associations::log_path_for_volset(self, node, id, task, dir, time)
    }

    /// Paths in `target` associated with this node.
    ///
    /// With `primary_only` only the first matching rule contributes. With
    /// `must_exist` paths that are not on any disk are dropped.
    pub fn associated_abspaths(
        &self,
        node: &PdsFile,
        target: Category,
        must_exist: bool,
        primary_only: bool,
    ) -> Result<Vec<PathBuf>, ResolveError> {
        associations::associated_abspaths(self, node, target, must_exist, primary_only)
    }

    // --- Shelf ---

    /// Shelf file and record key holding this node's `table_id` record.
    pub fn shelf_path_and_key(&self, node: &PdsFile, table_id: &str) -> Result<(PathBuf, String), ResolveError> {
        associations::shelf_path_and_key(self, node, table_id)
    }

    pub fn shelf_lookup<T: DeserializeOwned>(&self, node: &PdsFile, table_id: &str) -> Result<Option<T>, ResolveError> {
        let (path, key) = self.shelf_path_and_key(node, table_id)?;
        Ok(self.shelves.lookup(&path, &key)?)
    }

    /// Scans a volume directory and (re)writes its `info` shelf.
    pub fn build_info_shelf(&self, volume: &PdsFile) -> Result<(PathBuf, usize), ResolveError> {
        associations::build_info_shelf(self, volume)
    }

    // --- 预加载与遍历 ---

    /// Caches every holdings directory down to the volume level.
    pub fn preload(&self) -> Result<PreloadSummary, ResolveError> {
        preload::preload(self)
    }

    pub fn dir_iter(&self, node: &PdsFile) -> Result<DirIterator, ResolveError> {
        DirIterator::new(self, node)
    }

    pub fn file_iter<'a>(&'a self, node: &PdsFile, filter: FileFilter) -> Result<FileIterator<'a>, ResolveError> {
        FileIterator::new(self, node, filter)
    }

    pub fn row_iter<'a>(&'a self, node: &PdsFile) -> Result<RowIterator<'a>, ResolveError> {
        RowIterator::new(self, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_prefixes() {
        assert_eq!(HoldingsRoot::new(0, PathBuf::from("/d1/holdings")).url_prefix, "/holdings/");
        let second = HoldingsRoot::new(1, PathBuf::from("/d2/holdings"));
        assert_eq!(second.url_prefix, "/holdings2/");
        assert_eq!(second.disk_root, PathBuf::from("/d2"));
    }
}
