//! TTL-backed cache store. `V` is usually a [`crate::model::UniformChatResponse`]
//! or a single embedding vector.

use std::time::{Duration, Instant};

use mini_moka::sync::Cache;

/// A cached value plus the monotonic instant it stops being valid.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// `TryGet`/`Set`/`InvalidateByPrefix` over an in-memory TTL cache. TTL is
/// checked at read time on top of `mini_moka`'s own size-capped eviction, so
/// an entry can never be observed after its `expires_at` even if the
/// underlying cache hasn't swept it yet.
pub struct CacheStore<V: Clone + Send + Sync + 'static> {
    cache: Cache<String, CacheEntry<V>>,
}

impl<V: Clone + Send + Sync + 'static> CacheStore<V> {
    /// `max_capacity` is the size cap (default 200 per the spec); overflow
    /// evicts least-recently-used entries.
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    /// Returns the cached value for `key` if present and not yet expired.
    pub fn try_get(&self, key: &str) -> Option<V> {
        let entry = self.cache.get(&key.to_string())?;

        if Instant::now() >= entry.expires_at {
            self.cache.invalidate(&key.to_string());
            return None;
        }

        Some(entry.value)
    }

    /// Inserts `value` for `key`, expiring it `ttl` from now. Failures are
    /// never stored by callers; this store itself has no opinion on that.
    pub fn set(&self, key: String, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.cache.insert(key, entry);
    }

    /// Evicts every entry whose key starts with `prefix`.
    pub fn invalidate_by_prefix(&self, prefix: &str) {
        let matching: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in matching {
            self.cache.invalidate(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_none_after_ttl_elapses() {
        let store = CacheStore::new(10);
        store.set("k".to_string(), 42u32, Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.try_get("k"), None);
    }

    #[test]
    fn returns_value_within_ttl() {
        let store = CacheStore::new(10);
        store.set("k".to_string(), 42u32, Duration::from_secs(60));
        assert_eq!(store.try_get("k"), Some(42));
    }

    #[test]
    fn invalidate_by_prefix_only_removes_matching_keys() {
        let store = CacheStore::new(10);
        store.set("chat:a:1".to_string(), 1u32, Duration::from_secs(60));
        store.set("chat:b:1".to_string(), 2u32, Duration::from_secs(60));
        store.set("embed:a:1".to_string(), 3u32, Duration::from_secs(60));

        store.invalidate_by_prefix("chat:");

        assert_eq!(store.try_get("chat:a:1"), None);
        assert_eq!(store.try_get("chat:b:1"), None);
        assert_eq!(store.try_get("embed:a:1"), Some(3));
    }
}
