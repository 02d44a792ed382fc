pub mod path;

pub use path::{SegmentKind, SegmentPatterns, VolnameParts, VolsetParts};

use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::common::category::Category;
use crate::common::memo::Memo;
use crate::common::version::VersionInfo;
use crate::shelf::ShelfRecord;

/// The deepest path segment a node identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    /// The (virtual) holdings root.
    Root,
    Category,
    /// A volume-set directory, or a volume-set-level mirror file.
    Volset,
    /// A volume directory, or a volume-level mirror file.
    Volume,
    /// Anything beneath a volume.
    Interior,
}

/// The canonical identity of one node in the holdings hierarchy.
///
/// A node is identified by its `logical_path`. Physical location (`abspath`,
/// `disk_root`) is absent for virtual nodes, which merge the same directory
/// across several disks.
//
// // 归档层级中一个节点的规范身份。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdsFile {
    pub basename: String,

    /// Physical path, `None` for virtual nodes.
    // // 物理路径，虚拟节点为 None。
    pub abspath: Option<PathBuf>,

    /// Path relative to a holdings root, e.g. `volumes/ABC_1xxx/ABC_1001/DATA`.
    /// Empty for the root.
    // // 相对于 holdings 根目录的路径。
    pub logical_path: String,

    /// The directory containing `holdings/`.
    pub disk_root: Option<PathBuf>,

    /// `/holdings/` for the first disk, `/holdings2/` for the second, ...
    pub url_prefix: String,

    pub category: Option<Category>,

    /// Volume-set id without release suffix, e.g. `ABC_1xxx`.
    pub volset_id: String,

    /// Lower-cased release suffix, e.g. `_prelim`; empty for current releases.
    pub release_suffix: String,

    pub version: VersionInfo,

    pub volname: String,

    /// Path beneath the volume directory.
    pub interior: String,

    pub depth: Depth,

    pub is_virtual: bool,

    /// Permanent nodes are never evicted from the cache.
    pub permanent: bool,

    /// A row of an index table rather than a filesystem entry.
    pub is_index_row: bool,

    /// Name of the rule bundle governing this node.
    pub dataset: String,

    #[serde(default)]
    pub(crate) exists: Memo<bool>,
    #[serde(default)]
    pub(crate) isdir: Memo<bool>,
    #[serde(default)]
    pub(crate) childnames: Memo<Vec<String>>,
    #[serde(default)]
    pub(crate) info: Memo<ShelfRecord>,
    #[serde(default)]
    pub(crate) split: Memo<(String, String, String)>,
}

impl PdsFile {
    /// The virtual root above every category.
    pub fn virtual_root() -> Self {
        Self {
            basename: String::new(),
            abspath: None,
            logical_path: String::new(),
            disk_root: None,
            url_prefix: "/holdings/".to_string(),
            category: None,
            volset_id: String::new(),
            release_suffix: String::new(),
            version: VersionInfo::current(),
            volname: String::new(),
            interior: String::new(),
            depth: Depth::Root,
            is_virtual: true,
            permanent: true,
            is_index_row: false,
            dataset: String::new(),
            exists: Memo::filled(true),
            isdir: Memo::filled(true),
            childnames: Memo::new(),
            info: Memo::new(),
            split: Memo::new(),
        }
    }

    /// A virtual category directory whose children are the union of
    /// `childnames` across disks.
    pub fn virtual_category(category: Category, childnames: Vec<String>) -> Self {
        let name = category.dir_name();
        Self {
            basename: name.clone(),
            logical_path: name,
            category: Some(category),
            depth: Depth::Category,
            childnames: Memo::filled(childnames),
            ..Self::virtual_root()
        }
    }

    /// Volume-set directory name including the release suffix.
    pub fn volset_dir(&self) -> String {
        format!("{}{}", self.volset_id, self.release_suffix)
    }

    /// Public URL of this node.
    pub fn url(&self) -> String {
        format!("{}{}", self.url_prefix, self.logical_path)
    }

    /// Lower-cased logical path, used as the case-insensitive cache key.
    pub fn logical_key(&self) -> String {
        self.logical_path.to_lowercase()
    }

    /// Whether the node is a checksum or archive mirror file rather than a directory.
    pub fn is_mirror_file(&self) -> bool {
        self.category.is_some_and(|c| c.is_mirror())
            && matches!(self.depth, Depth::Volset | Depth::Volume)
            && (self.basename.to_ascii_lowercase().ends_with("_md5.txt")
                || self.basename.to_ascii_lowercase().ends_with(".tar.gz"))
    }

    /// Logical path of the parent, `None` at the root.
    pub fn parent_logical_path(&self) -> Option<&str> {
        if self.logical_path.is_empty() {
            return None;
        }
        Some(match self.logical_path.rfind('/') {
            Some(idx) => &self.logical_path[..idx],
            None => "",
        })
    }

    /// The identity of the parent directory, derived by clearing the fields
    /// owned by this node's depth. Lazy values are not carried over.
    ///
    /// Returns `None` for the root and for category nodes (their parent is
    /// the virtual root, not a physical node).
    pub fn parent_identity(&self) -> Option<PdsFile> {
        let parent_logical = self.parent_logical_path()?;
        if matches!(self.depth, Depth::Root | Depth::Category) {
            return None;
        }

        let abspath = self.abspath.as_ref().and_then(|p| p.parent().map(|p| p.to_path_buf()));
        let basename = parent_logical.rsplit('/').next().unwrap_or_default().to_string();

        let mut parent = PdsFile {
            basename,
            abspath,
            logical_path: parent_logical.to_string(),
            exists: Memo::new(),
            isdir: Memo::filled(true),
            childnames: Memo::new(),
            info: Memo::new(),
            split: Memo::new(),
            is_index_row: false,
            is_virtual: false,
            permanent: false,
            ..self.clone()
        };

        if self.is_index_row {
            // 父节点是索引表文件本身
            parent.isdir = Memo::new();
            parent.interior = parent_interior(&self.interior);
            return Some(parent);
        }

        match self.depth {
            Depth::Interior => {
                parent.interior = parent_interior(&self.interior);
                parent.depth = if parent.interior.is_empty() { Depth::Volume } else { Depth::Interior };
            }
            Depth::Volume => {
                parent.volname.clear();
                parent.depth = Depth::Volset;
            }
            Depth::Volset => {
                parent.volset_id.clear();
                parent.release_suffix.clear();
                parent.version = VersionInfo::current();
                parent.dataset.clear();
                parent.depth = Depth::Category;
            }
            Depth::Root | Depth::Category => return None,
        }
        Some(parent)
    }
}

fn parent_interior(interior: &str) -> String {
    match interior.rfind('/') {
        Some(idx) => interior[..idx].to_string(),
        None => String::new(),
    }
}

impl PartialEq for PdsFile {
    fn eq(&self, other: &Self) -> bool {
        self.logical_path == other.logical_path
    }
}

impl Eq for PdsFile {}
