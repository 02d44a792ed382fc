use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use crate::cache::CacheError;
use crate::cache::backend::CacheBackend;

struct Entry<V> {
    value: V,
    /// `None` for permanent entries.
    expires: Option<Instant>,
}

/// An in-process cache backed by a mutexed map.
pub struct LocalCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V> Default for LocalCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> Debug for LocalCache<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache").field("len", &self.lock().len()).finish()
    }
}

impl<V> LocalCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<V: Clone + Send + Sync> CacheBackend<V> for LocalCache<V> {
    fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => return Ok(None),
            Some(entry) => entry.expires.is_some_and(|at| at <= Instant::now()),
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: V, lifetime: u64) -> Result<(), CacheError> {
        let expires = (lifetime > 0).then(|| Instant::now() + Duration::from_secs(lifetime));
        self.lock().insert(key.to_string(), Entry { value, expires });
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.lock().remove(key).is_some())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.lock().clear();
        Ok(())
    }

    fn len(&self) -> Option<usize> {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.expires.is_none_or(|at| at > now));
        Some(entries.len())
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let cache: LocalCache<String> = LocalCache::new();
        cache.set("a", "1".to_string(), 0).unwrap();
        cache.set("b", "2".to_string(), 3600).unwrap();
        assert_eq!(cache.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(cache.len(), Some(2));
        assert!(cache.delete("a").unwrap());
        assert!(!cache.delete("a").unwrap());
        assert!(cache.get("a").unwrap().is_none());
        cache.clear().unwrap();
        assert_eq!(cache.len(), Some(0));
    }

    #[test]
    fn test_expired_entries_disappear() {
        let cache: LocalCache<u32> = LocalCache::new();
        cache.set("k", 1, 1).unwrap();
        // 手动让条目过期
        cache.lock().get_mut("k").unwrap().expires = Some(Instant::now() - Duration::from_secs(1));
        assert!(cache.get("k").unwrap().is_none());
        assert_eq!(cache.len(), Some(0));
    }

    #[test]
    fn test_batching_is_a_no_op() {
        let cache: LocalCache<u32> = LocalCache::new();
        cache.pause();
        cache.set("k", 7, 0).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(7));
        assert!(cache.block().unwrap());
        cache.unblock(true).unwrap();
        cache.resume().unwrap();
        assert!(!cache.is_paused());
    }
}
