//! TTL cache for extractor results.
//!
//! A concurrent map of string keys to cloneable values, each with its own
//! expiry. Expired entries read as misses and are purged on access, by
//! [`TtlCache::cleanup_expired`], or by the background sweeper.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default cap on the number of live entries.
pub const DEFAULT_MAX_ENTRIES: usize = 4096;

/// Default interval between sweeps of expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Thread-safe TTL cache.
///
/// With a non-zero `max_entries`, inserting a new key into a full cache
/// first drops expired entries and then, if still full, the entry closest
/// to expiry.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    /// Zero means unbounded.
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache holding at most `max_entries` keys (`0` = unbounded).
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the value if present and not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let Some(entry) = self.entries.get(key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if entry.is_expired() {
            drop(entry); // Release the shard lock before removing
            self.entries.remove_if(key, |_, entry| entry.is_expired());
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// Inserts or overwrites `key`.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        if self.max_entries > 0
            && self.entries.len() >= self.max_entries
            && !self.entries.contains_key(&key)
        {
            self.make_room();
        }
        self.entries.insert(key, CacheEntry::new(value, ttl));
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.len())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.len(),
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn make_room(&self) {
        if self.cleanup_expired() > 0 && self.entries.len() < self.max_entries {
            return;
        }

        let soonest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = soonest {
            debug!(key = %key, "Evicting cache entry closest to expiry");
            self.entries.remove(&key);
        }
    }
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    /// Periodically purge expired entries until `cancel_token` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Cache sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = cache.cleanup_expired();
                        if removed > 0 {
                            debug!(removed, remaining = cache.len(), "Swept expired cache entries");
                        }
                    }
                }
            }
        })
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let cache = TtlCache::new();
        cache.set("k", 7u32, Duration::from_secs(1));
        assert_eq!(cache.get("k"), Some(7));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_purged() {
        let cache = TtlCache::new();
        cache.set("k", "v".to_string(), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_overwrites_and_refreshes_ttl() {
        let cache = TtlCache::new();
        cache.set("k", 1, Duration::from_millis(10));
        cache.set("k", 2, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_invalidate() {
        let cache = TtlCache::new();
        cache.set("a", 1, Duration::from_secs(60));
        cache.set("b", 2, Duration::from_secs(60));
        cache.invalidate("a");
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some(2));
        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cleanup_expired() {
        let cache = TtlCache::new();
        cache.set("short", 1, Duration::from_millis(10));
        cache.set("long", 2, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_bounded_cache_never_exceeds_capacity() {
        let cache = TtlCache::with_max_entries(3);
        for i in 0..10u64 {
            cache.set(format!("k{i}"), i, Duration::from_secs(60 + i));
            assert!(cache.len() <= 3);
        }
        // Entries closest to expiry were evicted first.
        assert!(cache.get("k0").is_none());
        assert_eq!(cache.get("k9"), Some(9));
    }

    #[test]
    fn test_bounded_cache_prefers_dropping_expired() {
        let cache = TtlCache::with_max_entries(2);
        cache.set("stale", 0, Duration::from_millis(10));
        cache.set("fresh", 1, Duration::from_secs(5));
        std::thread::sleep(Duration::from_millis(20));
        cache.set("new", 2, Duration::from_secs(60));
        assert_eq!(cache.get("fresh"), Some(1));
        assert_eq!(cache.get("new"), Some(2));
    }

    #[test]
    fn test_overwrite_in_full_cache_does_not_evict() {
        let cache = TtlCache::with_max_entries(2);
        cache.set("a", 1, Duration::from_secs(60));
        cache.set("b", 2, Duration::from_secs(60));
        cache.set("a", 3, Duration::from_secs(60));
        assert_eq!(cache.get("a"), Some(3));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_unbounded_cache() {
        let cache = TtlCache::with_max_entries(0);
        for i in 0..100 {
            cache.set(format!("k{i}"), i, Duration::from_secs(60));
        }
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let cache = TtlCache::with_max_entries(8);
        cache.set("k", 1, Duration::from_secs(60));
        cache.get("k");
        cache.get("nope");
        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.max_entries, 8);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_sweeper_purges_and_stops() {
        let cache = Arc::new(TtlCache::new());
        cache.set("k", 1, Duration::from_millis(5));
        let token = CancellationToken::new();
        let handle = cache.spawn_sweeper(Duration::from_millis(10), token.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.is_empty());
        token.cancel();
        handle.await.unwrap();
    }
}
