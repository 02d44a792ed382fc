use std::fmt::Debug;
use crate::cache::CacheError;

/// A key-value store for one kind of cached payload.
///
/// Lifetimes are in seconds; `0` means the entry never expires.
/// The batching methods default to no-ops for backends whose writes are
/// immediately visible everywhere.
pub trait CacheBackend<V>: Send + Sync + Debug {
    // --- 读写 ---

    fn get(&self, key: &str) -> Result<Option<V>, CacheError>;

    fn set(&self, key: &str, value: V, lifetime: u64) -> Result<(), CacheError>;

    /// Returns whether an entry was removed.
    fn delete(&self, key: &str) -> Result<bool, CacheError>;

    fn clear(&self) -> Result<(), CacheError>;

    /// Number of live entries, when the backend can tell.
    fn len(&self) -> Option<usize>;

    fn kind(&self) -> &'static str;

    // --- 批处理 ---

    /// Starts deferring writes to shared storage. Calls nest.
    fn pause(&self) {}

    /// Ends one `pause`; the outermost resume flushes deferred writes.
    fn resume(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn is_paused(&self) -> bool {
        false
    }

    /// Tries to take the shared batch lock. Returns `false` if it could not
    /// be acquired within the configured attempts.
    fn block(&self) -> Result<bool, CacheError> {
        Ok(true)
    }

    /// Releases the batch lock, flushing deferred writes first if asked.
    fn unblock(&self, flush: bool) -> Result<(), CacheError> {
        if flush {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes deferred entries to shared storage now.
    fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
