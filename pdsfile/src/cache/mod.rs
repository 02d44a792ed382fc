pub mod backend;
pub mod local;
pub mod network;

pub use backend::CacheBackend;
pub use local::LocalCache;
pub use network::MemcachedCache;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use crate::archive::config::{BlockConfig, CacheConfig, LifetimeConfig};
use crate::file::{Depth, PdsFile};

/// Defines errors that can occur while talking to a cache backend.
//
// // 定义与缓存后端通信时可能发生的错误。
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The distributed cache could not be reached.
    //
    // // 无法连接到分布式缓存。
    #[error("Cannot connect to cache at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred on an established connection.
    //
    // // 已建立的连接上发生 I/O 错误。
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server sent a reply the client does not understand.
    //
    // // 服务器返回了无法理解的应答。
    #[error("Cache protocol error: {0}")]
    Protocol(String),

    /// A value could not be encoded or decoded.
    //
    // // 值的编码或解码失败。
    #[error("Cache value encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Owns the node cache and the two version tables.
///
/// - nodes: keyed by `abs:<abspath>` and `log:<lower-cased logical path>`
/// - ranks: `<category>/<volset or volname>` (lower-cased) -> sorted ranks
/// - vols: `<category>/<volset or volname>/<rank>` -> absolute path
///
/// Rank and path entries never expire.
//
// // 持有节点缓存以及两张版本表。
#[derive(Debug)]
pub struct CacheManager {
    nodes: Box<dyn CacheBackend<Arc<PdsFile>>>,
    ranks: Box<dyn CacheBackend<Vec<u32>>>,
    vols: Box<dyn CacheBackend<PathBuf>>,
    lifetimes: LifetimeConfig,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::local(LifetimeConfig::default())
    }
}

fn abs_key(path: &std::path::Path) -> String {
    format!("abs:{}", path.to_string_lossy())
}

fn logical_key(logical: &str) -> String {
    format!("log:{}", logical.to_lowercase())
}

fn table_key(category: &str, name: &str) -> String {
    format!("{}/{}", category, name).to_lowercase()
}

impl CacheManager {
    /// In-process caches only.
    pub fn local(lifetimes: LifetimeConfig) -> Self {
        Self {
            nodes: Box::new(LocalCache::new()),
            ranks: Box::new(LocalCache::new()),
            vols: Box::new(LocalCache::new()),
            lifetimes,
        }
    }

    pub fn with_backends(
        nodes: Box<dyn CacheBackend<Arc<PdsFile>>>,
        ranks: Box<dyn CacheBackend<Vec<u32>>>,
        vols: Box<dyn CacheBackend<PathBuf>>,
        lifetimes: LifetimeConfig,
    ) -> Self {
        Self { nodes, ranks, vols, lifetimes }
    }

    /// Builds the caches described by `config`.
    ///
    /// An unreachable memcached server is not fatal: the local backend is
    /// used instead and a warning is logged.
    pub fn from_config(config: &CacheConfig, lifetimes: LifetimeConfig, block: BlockConfig) -> Self {
        match config {
            CacheConfig::Local => Self::local(lifetimes),
            CacheConfig::Memcached { host, port, connect_retries } => {
                let connect = || -> Result<Self, CacheError> {
                    Ok(Self::with_backends(
                        memcached(host, *port, "nodes", *connect_retries, block)?,
                        memcached(host, *port, "ranks", *connect_retries, block)?,
                        memcached(host, *port, "vols", *connect_retries, block)?,
                        lifetimes,
                    ))
                };
                match connect() {
                    Ok(manager) => manager,
                    Err(e) => {
                        warn!("Memcached unavailable ({}); falling back to the local cache", e);
                        Self::local(lifetimes)
                    }
                }
            }
        }
    }

    pub fn backend_kind(&self) -> &'static str {
        self.nodes.kind()
    }

    /// Cache lifetime for a node: zero (permanent) at or above volume
    /// depth, otherwise the directory or file lifetime.
    pub fn lifetime_for(&self, node: &PdsFile) -> u64 {
        if node.permanent || node.depth <= Depth::Volume {
            return 0;
        }
        match node.isdir.get() {
            Some(true) => self.lifetimes.dir_seconds,
            _ => self.lifetimes.file_seconds,
        }
    }

    /// Caches `node` under both its keys.
    ///
    /// Non-virtual volume-set and volume directories also update the rank
    /// and path tables.
    pub fn insert(&self, node: Arc<PdsFile>) -> Result<(), CacheError> {
        let lifetime = self.lifetime_for(&node);

        if !node.is_virtual && !node.is_mirror_file() {
            self.record_version(&node)?;
        }

        if let Some(abspath) = &node.abspath {
            self.nodes.set(&abs_key(abspath), Arc::clone(&node), lifetime)?;
        }
        self.nodes.set(&logical_key(&node.logical_path), node, lifetime)?;
        Ok(())
    }

    fn record_version(&self, node: &PdsFile) -> Result<(), CacheError> {
        let (Some(category), Some(abspath)) = (node.category, &node.abspath) else {
            return Ok(());
        };
        let name = match node.depth {
            Depth::Volset => &node.volset_id,
            Depth::Volume => &node.volname,
            _ => return Ok(()),
        };

        let key = table_key(&category.dir_name(), name);
        let rank = node.version.rank;
        let mut ranks = self.ranks.get(&key)?.unwrap_or_default();
        if !ranks.contains(&rank) {
            ranks.push(rank);
            ranks.sort_unstable();
            self.ranks.set(&key, ranks, 0)?;
        }
        let vol_key = format!("{}/{}", key, rank);
        if self.vols.get(&vol_key)?.is_none() {
            self.vols.set(&vol_key, abspath.clone(), 0)?;
        }
        Ok(())
    }

    pub fn get_by_abspath(&self, abspath: &std::path::Path) -> Result<Option<Arc<PdsFile>>, CacheError> {
        self.nodes.get(&abs_key(abspath))
    }

    /// Case-insensitive lookup by logical path.
    pub fn get_by_logical(&self, logical_path: &str) -> Result<Option<Arc<PdsFile>>, CacheError> {
        self.nodes.get(&logical_key(logical_path))
    }

    /// Known ranks of a volume set (by id) or volume (by name), ascending.
    pub fn ranks(&self, category: &str, name: &str) -> Result<Vec<u32>, CacheError> {
        Ok(self.ranks.get(&table_key(category, name))?.unwrap_or_default())
    }

    /// Absolute path of the `rank` release of a volume set or volume.
    pub fn vol_path(&self, category: &str, name: &str, rank: u32) -> Result<Option<PathBuf>, CacheError> {
        self.vols.get(&format!("{}/{}", table_key(category, name), rank))
    }

    pub fn remove(&self, node: &PdsFile) -> Result<(), CacheError> {
        if let Some(abspath) = &node.abspath {
            self.nodes.delete(&abs_key(abspath))?;
        }
        self.nodes.delete(&logical_key(&node.logical_path))?;
        Ok(())
    }

    /// Drops only the abspath entry of a node, as a server eviction would.
    #[cfg(test)]
    pub(crate) fn forget_abspath(&self, abspath: &std::path::Path) -> Result<(), CacheError> {
        self.nodes.delete(&abs_key(abspath))?;
        Ok(())
    }

    // --- 批处理 ---

    pub fn pause(&self) {
        self.nodes.pause();
        self.ranks.pause();
        self.vols.pause();
    }

    pub fn resume(&self) -> Result<(), CacheError> {
        self.vols.resume()?;
        self.ranks.resume()?;
        self.nodes.resume()
    }

    pub fn is_paused(&self) -> bool {
        self.nodes.is_paused()
    }

    /// Takes the shared batch lock (best effort).
    pub fn block(&self) -> Result<bool, CacheError> {
        self.nodes.block()
    }

    pub fn unblock(&self, flush: bool) -> Result<(), CacheError> {
        if flush {
            self.vols.flush()?;
            self.ranks.flush()?;
        }
        self.nodes.unblock(flush)
    }

    pub fn flush(&self) -> Result<(), CacheError> {
        self.vols.flush()?;
        self.ranks.flush()?;
        self.nodes.flush()
    }

    /// Pauses and blocks until the returned guard is dropped, which then
    /// unblocks with a flush and resumes.
    pub fn batch(&self) -> CacheBatch<'_> {
        self.pause();
        let blocked = match self.block() {
            Ok(blocked) => blocked,
            Err(e) => {
                warn!("Failed to take the cache batch lock: {}", e);
                false
            }
        };
        CacheBatch { cache: self, blocked }
    }

    /// Drops every entry from all three caches.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.nodes.clear()?;
        self.ranks.clear()?;
        self.vols.clear()?;
        debug!("Cleared {} cache", self.backend_kind());
        Ok(())
    }

    /// Number of node entries (each node counts once per key), if known.
    pub fn len(&self) -> Option<usize> {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

fn memcached<V>(host: &str, port: u16, namespace: &str, retries: u32, block: BlockConfig) -> Result<Box<dyn CacheBackend<V>>, CacheError>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    Ok(Box::new(MemcachedCache::connect(
        host,
        port,
        namespace,
        retries,
        block.attempts,
        Duration::from_millis(block.backoff_millis),
    )?))
}

/// Scope guard returned by [`CacheManager::batch`].
pub struct CacheBatch<'a> {
    cache: &'a CacheManager,
    blocked: bool,
}

impl CacheBatch<'_> {
    /// Whether the shared lock was actually acquired.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }
}

impl Drop for CacheBatch<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.cache.unblock(true) {
            warn!("Failed to unblock cache: {}", e);
        }
        if let Err(e) = self.cache.resume() {
            warn!("Failed to resume cache: {}", e);
        }
    }
}
