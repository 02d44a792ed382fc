use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use crate::common::constants::{
    BLOCK_ATTEMPTS, BLOCK_BACKOFF_MILLIS, CONNECT_RETRIES, DEFAULT_DIR_LIFETIME, DEFAULT_FILE_LIFETIME,
    SHELF_CACHE_SIZE, SHELF_CACHE_SLOP,
};
use crate::rules::DatasetRules;

/// Top-level structure of the `pdsfile.json` configuration file.
//
// // `pdsfile.json` 配置文件的顶层结构。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchiveConfig {
    /// Holdings roots (`<disk>/holdings`). Order defines the disk index.
    pub holdings: Vec<PathBuf>,
    pub cache: CacheConfig,
    pub shelves: ShelfConfig,
    pub lifetimes: LifetimeConfig,
    pub block: BlockConfig,
    /// Forces case handling; probed from the first holdings root when absent.
    pub case_insensitive: Option<bool>,
    /// Root for validation log paths; `<disk>/logs` when absent.
    pub log_root: Option<PathBuf>,
    /// Per-dataset rule tables, consulted in order.
    pub datasets: Vec<DatasetRules>,
}

/// Which cache backend to use.
///
/// ```json
/// { "backend": "memcached", "host": "127.0.0.1", "port": 11211, "connectRetries": 3 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CacheConfig {
    #[default]
    Local,
    #[serde(rename_all = "camelCase")]
    Memcached {
        host: String,
        port: u16,
        #[serde(default = "default_connect_retries")]
        connect_retries: u32,
    },
}

fn default_connect_retries() -> u32 {
    CONNECT_RETRIES
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShelfConfig {
    pub cache_size: usize,
    pub cache_slop: usize,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            cache_size: SHELF_CACHE_SIZE,
            cache_slop: SHELF_CACHE_SLOP,
        }
    }
}

/// Cache lifetimes in seconds for nodes below the volume level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LifetimeConfig {
    pub file_seconds: u64,
    pub dir_seconds: u64,
}

impl Default for LifetimeConfig {
    fn default() -> Self {
        Self {
            file_seconds: DEFAULT_FILE_LIFETIME,
            dir_seconds: DEFAULT_DIR_LIFETIME,
        }
    }
}

/// Retry policy of the distributed cache lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockConfig {
    pub attempts: u32,
    pub backoff_millis: u64,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            attempts: BLOCK_ATTEMPTS,
            backoff_millis: BLOCK_BACKOFF_MILLIS,
        }
    }
}

impl ArchiveConfig {
    /// A local-cache configuration over the given holdings roots.
    pub fn with_holdings<I, P>(holdings: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            holdings: holdings.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}
