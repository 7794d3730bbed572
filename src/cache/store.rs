//! Stale-tolerant cache storage.
//!
//! Entries never disappear because their TTL elapsed: `get` keeps returning the
//! last value, flagged stale, until an explicit invalidation or the periodic
//! cleanup sweep removes it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use metrics::counter;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::{CacheKey, KeyPattern, Namespace};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_HIT: &str = "deskroute_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "deskroute_cache_miss_total";
pub(crate) const METRIC_CACHE_STALE: &str = "deskroute_cache_stale_total";
pub(crate) const METRIC_CACHE_INVALIDATED: &str = "deskroute_cache_invalidated_total";
pub(crate) const METRIC_CACHE_SWEPT: &str = "deskroute_cache_swept_total";

struct CacheEntry {
    payload: Arc<dyn Any + Send + Sync>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    fn is_stale(&self, now: Instant) -> bool {
        self.age(now) > self.ttl
    }

    fn is_expired(&self, now: Instant, multiplier: u32) -> bool {
        self.age(now) > self.ttl.saturating_mul(multiplier)
    }
}

/// A value read from the cache together with its staleness.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "a cached value may be stale; check `is_stale` before treating it as current"]
pub struct Cached<T> {
    pub data: T,
    pub is_stale: bool,
    pub age: Duration,
}

/// Namespaced, TTL-bound key/value cache shared by every read-heavy domain.
///
/// Reads and writes are synchronous and never await.
pub struct StaleCache {
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
    generation: AtomicU64,
}

impl StaleCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store `value` under `key` with an explicit TTL, overwriting any previous entry.
    pub fn set<T>(&self, key: impl AsRef<str>, value: T, ttl: Duration)
    where
        T: Send + Sync + 'static,
    {
        let entry = CacheEntry {
            payload: Arc::new(value),
            stored_at: Instant::now(),
            ttl,
        };
        rw_write(&self.entries, SOURCE, "set").insert(key.as_ref().to_string(), entry);
    }

    /// Store `value` using the TTL configured for the key's namespace.
    pub fn put<T>(&self, key: &CacheKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        let ttl = self.config.ttl_for(key.namespace());
        self.set(key, value, ttl);
    }

    /// Most recent value for `key`, flagged stale once its TTL has elapsed.
    ///
    /// Never evicts. A value stored under a different type reads as a miss.
    pub fn get<T>(&self, key: impl AsRef<str>) -> Option<Cached<T>>
    where
        T: Clone + 'static,
    {
        let key = key.as_ref();
        let namespace = namespace_label(key);
        let now = Instant::now();
        let guard = rw_read(&self.entries, SOURCE, "get");

        let Some(entry) = guard.get(key) else {
            counter!(METRIC_CACHE_MISS, "namespace" => namespace).increment(1);
            debug!(key, "cache miss");
            return None;
        };

        let Some(data) = entry.payload.downcast_ref::<T>() else {
            counter!(METRIC_CACHE_MISS, "namespace" => namespace).increment(1);
            warn!(
                key,
                expected = std::any::type_name::<T>(),
                "cache entry holds a different type; treating as miss"
            );
            return None;
        };

        let is_stale = entry.is_stale(now);
        if is_stale {
            counter!(METRIC_CACHE_STALE, "namespace" => namespace).increment(1);
        } else {
            counter!(METRIC_CACHE_HIT, "namespace" => namespace).increment(1);
        }
        debug!(key, is_stale, "cache hit");

        Some(Cached {
            data: data.clone(),
            is_stale,
            age: entry.age(now),
        })
    }

    pub fn contains_key(&self, key: impl AsRef<str>) -> bool {
        rw_read(&self.entries, SOURCE, "contains_key").contains_key(key.as_ref())
    }

    /// Remove every key matching `pattern`; `None` clears the whole cache.
    ///
    /// Returns the number of removed entries.
    pub fn invalidate(&self, pattern: Option<&KeyPattern>) -> usize {
        let mut guard = rw_write(&self.entries, SOURCE, "invalidate");
        let before = guard.len();
        match pattern {
            Some(pattern) => guard.retain(|key, _| !pattern.matches(key)),
            None => guard.clear(),
        }
        let removed = before - guard.len();
        self.generation.fetch_add(1, Ordering::AcqRel);
        drop(guard);

        counter!(METRIC_CACHE_INVALIDATED).increment(removed as u64);
        let pattern = pattern.map_or_else(|| "*".to_string(), ToString::to_string);
        debug!(%pattern, removed, "cache invalidated");
        removed
    }

    /// Bumped by every invalidation. Results fetched under an older
    /// generation must not be reused.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Remove every entry belonging to any of `namespaces`.
    pub fn invalidate_namespaces(&self, namespaces: &[Namespace]) -> usize {
        namespaces
            .iter()
            .map(|ns| self.invalidate(Some(&ns.pattern())))
            .sum()
    }

    /// Drop everything. Administrative only; mutations invalidate selectively.
    pub fn clear(&self) -> usize {
        self.invalidate(None)
    }

    /// Sweep entries older than `stale_multiplier` times their own TTL.
    pub fn cleanup(&self) -> usize {
        let multiplier = self.config.stale_multiplier_non_zero();
        let now = Instant::now();
        let mut guard = rw_write(&self.entries, SOURCE, "cleanup");
        let before = guard.len();
        guard.retain(|_, entry| !entry.is_expired(now, multiplier));
        let swept = before - guard.len();
        drop(guard);

        if swept > 0 {
            counter!(METRIC_CACHE_SWEPT).increment(swept as u64);
            debug!(swept, "cache cleanup removed expired entries");
        }
        swept
    }

    /// Get the number of cached entries.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted snapshot of the stored keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = rw_read(&self.entries, SOURCE, "keys")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl Default for StaleCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn namespace_label(key: &str) -> &'static str {
    Namespace::of_key(key).map_or("other", Namespace::prefix)
}
