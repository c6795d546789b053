//! Time-boxed in-memory cache.
//!
//! A session-scoped key/value store with a single TTL. An entry is valid iff
//! `now - stored_at < ttl`; expired entries are treated as absent and
//! reclaimed lazily on the next `get` for that key. There is no background
//! sweeper. Hit/miss counts are recorded on the shared metrics object.
//!
//! Timestamps use `tokio::time::Instant` so tests can drive expiry with a
//! paused clock.

use crate::metrics::ClientMetrics;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    metrics: Arc<ClientMetrics>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, metrics: Arc<ClientMetrics>) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a key, counting a hit or a miss. An expired entry counts as a
    /// miss and is removed.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                let value = entry.value.clone();
                self.metrics.record_cache_hit();
                Some(value)
            }
            Some(_) => {
                entries.remove(key);
                self.metrics.record_cache_miss();
                None
            }
            None => {
                self.metrics.record_cache_miss();
                None
            }
        }
    }

    /// Look up a key without touching the hit/miss counters.
    ///
    /// Used by the orchestrator's in-flight latch to re-check after waiting
    /// on a concurrent fetch for the same key; that re-check is an internal
    /// step of one logical `get`, not a second lookup.
    pub fn peek(&self, key: &str) -> Option<V> {
        let entries = self.lock();
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Store a value, overwriting any existing entry with a fresh timestamp.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let mut entries = self.lock();
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop the entry for one key, if present.
    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Remove all entries and zero the hit/miss counters.
    pub fn clear(&self) {
        self.lock().clear();
        self.metrics.reset_cache_counters();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_ttl(ttl_ms: u64) -> (TtlCache<Vec<&'static str>>, Arc<ClientMetrics>) {
        let metrics = Arc::new(ClientMetrics::new());
        (
            TtlCache::new(Duration::from_millis(ttl_ms), metrics.clone()),
            metrics,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_within_ttl_hits() {
        let (cache, metrics) = cache_with_ttl(1_000);
        cache.put("jobs", vec!["job1"]);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(cache.get("jobs"), Some(vec!["job1"]));
        assert_eq!(metrics.snapshot().cache_hits, 1);
        assert_eq!(metrics.snapshot().cache_misses, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_after_ttl_misses_and_evicts() {
        let (cache, metrics) = cache_with_ttl(1_000);
        cache.put("jobs", vec!["job1"]);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(cache.get("jobs"), None);
        assert_eq!(metrics.snapshot().cache_misses, 1);
        // Lazy eviction removed the entry.
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_boundary_is_exclusive() {
        // An entry exactly ttl old is expired: valid iff elapsed < ttl.
        let (cache, _) = cache_with_ttl(1_000);
        cache.put("k", vec!["v"]);

        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let (cache, _) = cache_with_ttl(1_000);
        cache.put("k", vec!["v1"]);
        cache.put("k", vec!["v2"]);
        assert_eq!(cache.get("k"), Some(vec!["v2"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_refreshes_timestamp() {
        let (cache, _) = cache_with_ttl(1_000);
        cache.put("k", vec!["v1"]);

        tokio::time::advance(Duration::from_millis(800)).await;
        cache.put("k", vec!["v2"]);

        tokio::time::advance(Duration::from_millis(800)).await;
        // 1600ms after the first put but only 800ms after the second.
        assert_eq!(cache.get("k"), Some(vec!["v2"]));
    }

    #[tokio::test]
    async fn test_invalidate_removes_single_key() {
        let (cache, _) = cache_with_ttl(1_000);
        cache.put("a", vec!["1"]);
        cache.put("b", vec!["2"]);
        cache.invalidate("a");

        assert_eq!(cache.peek("a"), None);
        assert_eq!(cache.peek("b"), Some(vec!["2"]));
    }

    #[tokio::test]
    async fn test_clear_resets_hit_miss_counters() {
        let (cache, metrics) = cache_with_ttl(1_000);
        cache.put("k", vec!["v"]);
        cache.get("k");
        cache.get("missing");
        assert_eq!(metrics.snapshot().cache_hits, 1);
        assert_eq!(metrics.snapshot().cache_misses, 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(metrics.snapshot().cache_hits, 0);
        assert_eq!(metrics.snapshot().cache_misses, 0);
    }

    #[tokio::test]
    async fn test_peek_does_not_count() {
        let (cache, metrics) = cache_with_ttl(1_000);
        cache.put("k", vec!["v"]);
        cache.peek("k");
        cache.peek("missing");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 0);
        assert_eq!(snapshot.cache_misses, 0);
    }
}
