pub mod build;
mod table;

pub use build::{scan_volume_info, write_info_shelf};
pub use table::ShelfWriter;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::common::constants::{SHELF_CACHE_SIZE, SHELF_CACHE_SLOP};

/// Defines errors that can occur while reading or writing shelf tables.
//
// // 定义在读写 shelf 表时可能发生的错误。
#[derive(Debug, thiserror::Error)]
pub enum ShelfError {
    /// The shelf table file does not exist.
    //
    // // shelf 表文件不存在。
    #[error("Shelf file not found: {0:?}")]
    Missing(PathBuf),

    /// The table exists but could not be opened or queried.
    //
    // // 表存在，但无法打开或查询。
    #[error("Shelf database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored value is not valid JSON for the requested type.
    //
    // // 存储的值不是所请求类型的有效 JSON。
    #[error("Failed to decode shelf value: {0}")]
    Decode(#[from] serde_json::Error),

    /// An I/O error occurred while scanning a volume or creating a table.
    //
    // // 扫描卷或创建表时发生 I/O 错误。
    #[error("Shelf I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Walking a volume directory failed.
    //
    // // 遍历卷目录失败。
    #[error("Failed to walk volume directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Per-interior-path metadata stored in an `info` shelf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShelfRecord {
    pub bytes: u64,
    pub child_count: u64,
    /// `%Y-%m-%d %H:%M:%S`, UTC.
    pub modtime: String,
    /// Filled in by external checksum tools; empty when unknown.
    pub checksum: String,
    pub width: u32,
    pub height: u32,
}

struct OpenShelf {
    conn: Connection,
    last_access: u64,
}

#[derive(Default)]
struct ShelfPool {
    handles: HashMap<PathBuf, OpenShelf>,
    counter: u64,
    /// Raw summary (`""` key) values, evicted together with their handle.
    summaries: HashMap<PathBuf, Option<String>>,
}

/// A bounded pool of read-only shelf table handles.
///
/// At most `cache_size + cache_slop` tables are open at once. When that is
/// exceeded the least recently accessed handles are closed until only
/// `cache_size` remain.
pub struct ShelfStore {
    pool: Mutex<ShelfPool>,
    cache_size: usize,
    cache_slop: usize,
}

impl Default for ShelfStore {
    fn default() -> Self {
        Self::new(SHELF_CACHE_SIZE, SHELF_CACHE_SLOP)
    }
}

impl std::fmt::Debug for ShelfStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShelfStore")
            .field("open", &self.open_count())
            .field("cache_size", &self.cache_size)
            .field("cache_slop", &self.cache_slop)
            .finish()
    }
}

impl ShelfStore {
    pub fn new(cache_size: usize, cache_slop: usize) -> Self {
        Self {
            pool: Mutex::new(ShelfPool::default()),
            cache_size: cache_size.max(1),
            cache_slop,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ShelfPool> {
        // 池中只有缓存数据，锁中毒后仍可继续使用
        self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reads and decodes the record stored under `key`.
    ///
    /// Returns `Ok(None)` when the table exists but has no such key. A missing
    /// table is [`ShelfError::Missing`].
    pub fn lookup<T: DeserializeOwned>(&self, path: &Path, key: &str) -> Result<Option<T>, ShelfError> {
        let mut pool = self.lock();

        if key.is_empty() {
            if let Some(summary) = pool.summaries.get(path) {
                return decode(summary.as_deref());
            }
        }

        let raw = {
            let conn = self.handle(&mut pool, path)?;
            table::read_value(conn, key)?
        };
        if key.is_empty() {
            pool.summaries.insert(path.to_path_buf(), raw.clone());
        }
        decode(raw.as_deref())
    }

    /// All record keys except the summary, in insertion order.
    pub fn keys(&self, path: &Path) -> Result<Vec<String>, ShelfError> {
        let mut pool = self.lock();
        let conn = self.handle(&mut pool, path)?;
        table::read_keys(conn)
    }

    pub fn open_count(&self) -> usize {
        self.lock().handles.len()
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.lock().handles.contains_key(path)
    }

    /// Closes every handle and forgets cached summaries.
    pub fn close_all(&self) {
        let mut pool = self.lock();
        pool.handles.clear();
        pool.summaries.clear();
    }

    fn handle<'p>(&self, pool: &'p mut ShelfPool, path: &Path) -> Result<&'p Connection, ShelfError> {
        pool.counter += 1;
        let counter = pool.counter;

        if !pool.handles.contains_key(path) {
            let conn = table::open_readonly(path)?;
            pool.handles.insert(path.to_path_buf(), OpenShelf { conn, last_access: counter });
            if pool.handles.len() > self.cache_size + self.cache_slop {
                self.trim(pool);
            }
        }

        match pool.handles.get_mut(path) {
            Some(shelf) => {
                shelf.last_access = counter;
                Ok(&shelf.conn)
            }
            None => Err(ShelfError::Missing(path.to_path_buf())),
        }
    }

    fn trim(&self, pool: &mut ShelfPool) {
        let mut by_age: Vec<(u64, PathBuf)> = pool
            .handles
            .iter()
            .map(|(path, shelf)| (shelf.last_access, path.clone()))
            .collect();
        by_age.sort();

        let excess = pool.handles.len().saturating_sub(self.cache_size);
        for (_, path) in by_age.into_iter().take(excess) {
            pool.handles.remove(&path);
            pool.summaries.remove(&path);
        }
        debug!("Trimmed shelf pool to {} open tables", pool.handles.len());
    }
}

fn decode<T: DeserializeOwned>(raw: Option<&str>) -> Result<Option<T>, ShelfError> {
    match raw {
        Some(json) => Ok(Some(serde_json::from_str(json)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_shelf(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(format!("{name}.shelf"));
        let writer = ShelfWriter::create(&path).unwrap();
        writer.put("", &ShelfRecord { bytes: 42, ..Default::default() }).unwrap();
        writer.put("DATA/F.IMG", &ShelfRecord { bytes: 7, width: 2, height: 3, ..Default::default() }).unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_lookup_records() {
        let dir = tempdir().unwrap();
        let path = make_shelf(dir.path(), "a");
        let store = ShelfStore::default();

        let rec: ShelfRecord = store.lookup(&path, "DATA/F.IMG").unwrap().unwrap();
        assert_eq!((rec.bytes, rec.width, rec.height), (7, 2, 3));
        assert!(store.lookup::<ShelfRecord>(&path, "nope").unwrap().is_none());
        assert_eq!(store.keys(&path).unwrap(), vec!["DATA/F.IMG".to_string()]);
    }

    #[test]
    fn test_summary_survives_close() {
        let dir = tempdir().unwrap();
        let path = make_shelf(dir.path(), "a");
        let store = ShelfStore::default();

        let summary: ShelfRecord = store.lookup(&path, "").unwrap().unwrap();
        assert_eq!(summary.bytes, 42);

        // 句柄关闭后，摘要仍从缓存读取
        store.lock().handles.clear();
        std::fs::remove_file(&path).unwrap();
        let again: ShelfRecord = store.lookup(&path, "").unwrap().unwrap();
        assert_eq!(again.bytes, 42);
        assert_eq!(store.open_count(), 0);
    }

    #[test]
    fn test_missing_shelf_is_an_error() {
        let dir = tempdir().unwrap();
        let store = ShelfStore::default();
        let err = store.lookup::<ShelfRecord>(&dir.path().join("missing.shelf"), "x").unwrap_err();
        assert!(matches!(err, ShelfError::Missing(_)));
    }

    #[test]
    fn test_small_pool_trims_oldest() {
        let dir = tempdir().unwrap();
        let store = ShelfStore::new(2, 1);
        let paths: Vec<PathBuf> = (0..4).map(|i| make_shelf(dir.path(), &format!("t{i}"))).collect();

        for path in &paths[..3] {
            store.lookup::<ShelfRecord>(path, "DATA/F.IMG").unwrap();
        }
        assert_eq!(store.open_count(), 3);
        // 再次访问 t0，使 t1 成为最久未访问
        store.lookup::<ShelfRecord>(&paths[0], "DATA/F.IMG").unwrap();
        store.lookup::<ShelfRecord>(&paths[3], "DATA/F.IMG").unwrap();

        assert_eq!(store.open_count(), 2);
        assert!(store.is_open(&paths[0]));
        assert!(store.is_open(&paths[3]));
        assert!(!store.is_open(&paths[1]));
        assert!(!store.is_open(&paths[2]));
    }

    #[test]
    fn test_trim_drops_evicted_summaries() {
        let dir = tempdir().unwrap();
        let store = ShelfStore::new(2, 1);
        let paths: Vec<PathBuf> = (0..4).map(|i| make_shelf(dir.path(), &format!("s{i}"))).collect();

        for path in &paths {
            let summary: ShelfRecord = store.lookup(path, "").unwrap().unwrap();
            assert_eq!(summary.bytes, 42);
        }

        // 摘要只保留仍打开的表
        let pool = store.lock();
        assert_eq!(pool.handles.len(), 2);
        assert_eq!(pool.summaries.len(), 2);
        assert!(pool.summaries.keys().all(|path| pool.handles.contains_key(path)));
        drop(pool);

        // 被淘汰的摘要重新从表中读取
        let again: ShelfRecord = store.lookup(&paths[0], "").unwrap().unwrap();
        assert_eq!(again.bytes, 42);
        assert!(store.is_open(&paths[0]));
    }
}
