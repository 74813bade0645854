use super::clock::{Clock, SystemClock};
use super::pattern::KeyPattern;
use parking_lot::Mutex;
use shared::TtlMs;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionCacheConfig {
    pub default_ttl: Duration,
    pub max_entries: usize,
}

impl SessionCacheConfig {
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            default_ttl,
            max_entries,
        }
    }

    pub fn from_config(config: &shared::config::Config) -> Self {
        Self::new(
            Duration::from_millis(config.cache_ttl_ms),
            config.cache_max_entries,
        )
    }
}

impl Default for SessionCacheConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), 200)
    }
}

/// A cached value with its timing metadata. Timestamps are in milliseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry<V> {
    pub data: V,
    pub created_at: u64,
    pub expires_at: u64,
    pub last_access_at: u64,
    // insertion sequence, breaks recency ties
    seq: u64,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at
    }

    fn recency_key(&self) -> (u64, u64) {
        (self.last_access_at, self.seq)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_hits: u64,
    pub evictions: u64,
    pub expirations: u64,
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    // (last_access_at, seq) -> key; first entry is the eviction victim
    recency: BTreeMap<(u64, u64), String>,
    next_seq: u64,
    stats: CacheStats,
}

impl<V> Inner<V> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.recency_key());
        Some(entry)
    }

    fn touch(&mut self, key: &str, now: u64) {
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.recency_key());
            entry.last_access_at = now;
            self.recency.insert(entry.recency_key(), key.to_string());
        }
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key);
        self.stats.evictions += 1;
        Some(key)
    }
}

/// Process-wide key/value cache with per-entry TTL and least-recently-used
/// eviction.
///
/// Every method completes immediately. Expired entries are never returned by
/// [`get`](Self::get) or [`has`](Self::has); they remain visible only to
/// [`get_stale`](Self::get_stale) until something deletes them.
pub struct SessionCache<V> {
    config: SessionCacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner<V>>,
}

impl<V> SessionCache<V>
where
    V: Clone + Send + 'static,
{
    /// A `max_entries` of zero is treated as one.
    pub fn new(config: SessionCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(config: SessionCacheConfig, clock: Arc<dyn Clock>) -> Self {
        let config = SessionCacheConfig {
            max_entries: config.max_entries.max(1),
            ..config
        };

        Self {
            config,
            clock,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                next_seq: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn config(&self) -> SessionCacheConfig {
        self.config
    }

    /// Store `data` under `key`, evicting the least recently accessed entry
    /// first when the cache is full.
    pub fn set(&self, key: impl Into<String>, data: V, ttl: Option<TtlMs>) {
        let key = key.into();
        let now = self.clock.now_ms();
        let ttl_ms = ttl
            .map(|t| t.0)
            .unwrap_or(self.config.default_ttl.as_millis() as u64);

        let mut inner = self.inner.lock();
        let replaced = inner.remove(&key).is_some();

        if !replaced && inner.entries.len() >= self.config.max_entries {
            if let Some(victim) = inner.evict_lru() {
                debug!("Evicted least recently used cache entry '{}'", victim);
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;

        let entry = CacheEntry {
            data,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
            last_access_at: now,
            seq,
        };
        inner.recency.insert(entry.recency_key(), key.clone());
        inner.entries.insert(key, entry);
    }

    /// Fresh lookup. Marks the entry as recently used; deletes it if expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();

        let Some(expired) = inner.entries.get(key).map(|e| e.is_expired(now)) else {
            inner.stats.misses += 1;
            return None;
        };

        if expired {
            inner.remove(key);
            inner.stats.expirations += 1;
            inner.stats.misses += 1;
            debug!("Cache entry '{}' expired on access", key);
            return None;
        }

        inner.touch(key, now);
        inner.stats.hits += 1;
        inner.entries.get(key).map(|e| e.data.clone())
    }

    /// Last-resort lookup that ignores expiry. Never deletes, never touches
    /// recency.
    pub fn get_stale(&self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        let (data, expired) = {
            let entry = inner.entries.get(key)?;
            (entry.data.clone(), entry.is_expired(now))
        };
        // only a served expired copy counts as a stale hit
        if expired {
            inner.stats.stale_hits += 1;
        }
        Some(data)
    }

    /// Whether a fresh entry exists. Does not touch recency.
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Replace the data of a fresh entry, keeping its expiry. Returns `false`
    /// when the entry is absent or expired; nothing is written then.
    pub fn update<F>(&self, key: &str, f: F) -> bool
    where
        F: FnOnce(&V) -> V,
    {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();

        let Some(entry) = inner.entries.get_mut(key) else {
            return false;
        };
        if entry.is_expired(now) {
            return false;
        }

        entry.data = f(&entry.data);
        inner.touch(key, now);
        true
    }

    /// Copy of the entry with its timing metadata, without touching it.
    pub fn inspect(&self, key: &str) -> Option<CacheEntry<V>> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// With no pattern, clears everything. Returns the number of removed keys.
    pub fn invalidate(&self, pattern: Option<&KeyPattern>) -> usize {
        let mut inner = self.inner.lock();

        let Some(pattern) = pattern else {
            let removed = inner.entries.len();
            inner.entries.clear();
            inner.recency.clear();
            debug!("Cleared {} cache entries", removed);
            return removed;
        };

        let doomed: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| pattern.matches(k))
            .cloned()
            .collect();
        for key in &doomed {
            inner.remove(key);
        }
        debug!("Invalidated {} cache entries matching {:?}", doomed.len(), pattern);
        doomed.len()
    }

    /// Drop every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        inner.stats.expirations += expired.len() as u64;
        expired.len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}

impl<V> Debug for SessionCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SessionCache")
            .field("config", &self.config)
            .field("entry_count", &inner.entries.len())
            .field("stats", &inner.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use proptest::prelude::*;

    fn cache_with(max_entries: usize, ttl_ms: u64) -> (SessionCache<i32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = SessionCache::with_clock(
            SessionCacheConfig::new(Duration::from_millis(ttl_ms), max_entries),
            clock.clone(),
        );
        (cache, clock)
    }

    #[test]
    fn test_set_and_get() {
        let (cache, _) = cache_with(10, 1_000);
        cache.set("a", 1, None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let (cache, _) = cache_with(2, 1_000);
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.set("a", 10, None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_evicts_oldest_insertion_without_access() {
        let (cache, _) = cache_with(2, 60_000);
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.set("c", 3, None);

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_eviction_follows_access_not_insertion() {
        let (cache, clock) = cache_with(2, 60_000);
        cache.set("a", 1, None);
        clock.advance(1);
        cache.set("b", 2, None);
        clock.advance(1);

        // "a" becomes the most recently used
        assert_eq!(cache.get("a"), Some(1));
        clock.advance(1);
        cache.set("c", 3, None);

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_recency_ties_break_by_insertion_order() {
        let (cache, _) = cache_with(3, 60_000);
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.set("c", 3, None);
        // all share the same timestamp; "a" was inserted first
        cache.set("d", 4, None);

        assert!(!cache.has("a"));
        assert!(cache.has("b"));
        assert!(cache.has("c"));
        assert!(cache.has("d"));
    }

    #[test]
    fn test_get_deletes_expired_entry() {
        let (cache, clock) = cache_with(10, 100);
        cache.set("a", 1, None);

        clock.advance(100);
        // expires_at == now is still fresh
        assert_eq!(cache.get("a"), Some(1));

        clock.advance(1);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get_stale("a"), None);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_per_entry_ttl_overrides_default() {
        let (cache, clock) = cache_with(10, 100);
        cache.set("short", 1, Some(TtlMs(10)));
        cache.set("long", 2, Some(TtlMs(10_000)));

        clock.advance(500);
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[test]
    fn test_get_stale_ignores_expiry_and_recency() {
        let (cache, clock) = cache_with(2, 100);
        cache.set("a", 1, None);
        clock.advance(1);
        cache.set("b", 2, None);
        clock.advance(500);

        assert!(!cache.has("a"));
        assert_eq!(cache.get_stale("a"), Some(1));
        // still present, and still the LRU victim
        assert_eq!(cache.len(), 2);
        let before = cache.inspect("a").unwrap();
        assert_eq!(before.last_access_at, 1_000);

        cache.set("c", 3, None);
        assert_eq!(cache.get_stale("a"), None);
        assert_eq!(cache.get_stale("b"), Some(2));
    }

    #[test]
    fn test_has_does_not_touch_recency() {
        let (cache, clock) = cache_with(2, 60_000);
        cache.set("a", 1, None);
        clock.advance(1);
        cache.set("b", 2, None);
        clock.advance(1);

        assert!(cache.has("a"));
        cache.set("c", 3, None);

        assert!(!cache.has("a"));
        assert!(cache.has("b"));
    }

    #[test]
    fn test_has_reports_expired_as_absent_without_deleting() {
        let (cache, clock) = cache_with(10, 50);
        cache.set("a", 1, None);
        clock.advance(51);

        assert!(!cache.has("a"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_update_preserves_expiry() {
        let (cache, clock) = cache_with(10, 100);
        cache.set("a", 1, None);
        let expires_at = cache.inspect("a").unwrap().expires_at;

        clock.advance(60);
        assert!(cache.update("a", |v| v + 1));

        let entry = cache.inspect("a").unwrap();
        assert_eq!(entry.data, 2);
        assert_eq!(entry.expires_at, expires_at);
        assert_eq!(entry.last_access_at, 1_060);
    }

    #[test]
    fn test_update_skips_missing_and_expired() {
        let (cache, clock) = cache_with(10, 100);
        assert!(!cache.update("missing", |v| v + 1));

        cache.set("a", 1, None);
        clock.advance(101);
        assert!(!cache.update("a", |v| v + 1));
        assert_eq!(cache.get_stale("a"), Some(1));
    }

    #[test]
    fn test_invalidate_all_and_by_pattern() {
        let (cache, _) = cache_with(10, 60_000);
        cache.set("poems:{\"page\":\"0\"}:ur:ghazlen", 1, None);
        cache.set("poems:{\"page\":\"1\"}:ur:ghazlen", 2, None);
        cache.set("poets:{}:ur:ghazlen", 3, None);

        let removed = cache.invalidate(Some(&KeyPattern::prefix("poems:")));
        assert_eq!(removed, 2);
        assert_eq!(cache.keys(), vec!["poets:{}:ur:ghazlen".to_string()]);

        assert_eq!(cache.invalidate(None), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let (cache, clock) = cache_with(10, 100);
        cache.set("a", 1, None);
        cache.set("b", 2, Some(TtlMs(1_000)));
        clock.advance(200);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (cache, _) = cache_with(0, 1_000);
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let (cache, clock) = cache_with(10, 1_000);
        cache.set("a", 1, None);
        cache.get("a");
        cache.get("b");
        cache.get_stale("a");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.stale_hits, 0);

        clock.advance(2_000);
        assert_eq!(cache.get_stale("a"), Some(1));
        assert_eq!(cache.get_stale("b"), None);
        assert_eq!(cache.stats().stale_hits, 1);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Set(u8),
        Get(u8),
        Tick,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..12).prop_map(Op::Set),
            (0u8..12).prop_map(Op::Get),
            Just(Op::Tick),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Property: the cache never exceeds its bound, and every eviction
        /// removes the entry with the least recent access.
        #[test]
        fn prop_bounded_and_lru(
            max_entries in 1usize..6,
            ops in proptest::collection::vec(op_strategy(), 1..80),
        ) {
            let (cache, clock) = cache_with(max_entries, 1_000_000);

            for op in ops {
                match op {
                    Op::Set(k) => {
                        let key = k.to_string();
                        let before: Vec<(String, (u64, u64))> = cache
                            .keys()
                            .into_iter()
                            .map(|key| {
                                let e = cache.inspect(&key).expect("listed key");
                                (key, e.recency_key())
                            })
                            .collect();
                        let full = before.len() == max_entries
                            && !before.iter().any(|(existing, _)| existing == &key);

                        cache.set(key.clone(), k as i32, None);
                        prop_assert!(cache.len() <= max_entries);

                        if full {
                            let victim = before
                                .iter()
                                .min_by_key(|(_, recency)| *recency)
                                .map(|(k, _)| k.clone())
                                .expect("cache was full");
                            prop_assert!(cache.inspect(&victim).is_none());
                        }
                    }
                    Op::Get(k) => {
                        cache.get(&k.to_string());
                    }
                    Op::Tick => clock.advance(1),
                }
            }
        }
    }
}
