//! Read-path outcomes and the shared cache-first fetch routine.

use std::future::Future;

use metrics::counter;
use tracing::{debug, warn};

use crate::application::error::AppError;
use crate::application::repos::RepoError;
use crate::cache::{CacheKey, RequestCoalescer, StaleCache};

pub(crate) const METRIC_CACHE_FALLBACK: &str = "deskroute_cache_fallback_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Served from a live fetch or an unexpired cache entry.
    Fresh,
    /// Last known value, served because the refresh failed.
    Stale { reason: String },
}

/// Data produced by a read path together with how current it is.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "a read may fall back to stale data; inspect `freshness` before acting on it"]
pub struct Fetched<T> {
    pub data: T,
    pub freshness: Freshness,
}

impl<T> Fetched<T> {
    pub fn fresh(data: T) -> Self {
        Self {
            data,
            freshness: Freshness::Fresh,
        }
    }

    pub fn stale(data: T, reason: impl Into<String>) -> Self {
        Self {
            data,
            freshness: Freshness::Stale {
                reason: reason.into(),
            },
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            data: f(self.data),
            freshness: self.freshness,
        }
    }

    pub fn into_parts(self) -> (T, Freshness) {
        (self.data, self.freshness)
    }
}

/// Cache first, then a coalesced backing fetch; falls back to the last cached
/// value when the fetch fails.
///
/// `force` skips the fresh-entry shortcut and any settled coalesced result.
pub(crate) async fn read_through<T, F, Fut>(
    cache: &StaleCache,
    coalescer: &RequestCoalescer<T, RepoError>,
    key: &CacheKey,
    force: bool,
    fetch: F,
) -> Result<Fetched<T>, AppError>
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, RepoError>> + Send + 'static,
{
    let cached = cache.get::<T>(key);
    if force {
        coalescer.forget_settled();
    } else if let Some(hit) = cached.as_ref().filter(|hit| !hit.is_stale) {
        return Ok(Fetched::fresh(hit.data.clone()));
    }

    match coalescer.run(key.as_str(), cache.generation(), fetch).await {
        Ok(data) => {
            cache.put(key, data.clone());
            debug!(key = %key, "cache refreshed from backing source");
            Ok(Fetched::fresh(data))
        }
        Err(error) => match cached {
            Some(previous) => {
                counter!(METRIC_CACHE_FALLBACK, "namespace" => key.namespace().prefix())
                    .increment(1);
                warn!(
                    key = %key,
                    error = %error,
                    age_secs = previous.age.as_secs(),
                    "fetch failed; serving last cached value"
                );
                Ok(Fetched::stale(previous.data, error.to_string()))
            }
            None => Err(AppError::from(error)),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::CacheConfig;

    fn fixtures() -> (StaleCache, RequestCoalescer<u32, RepoError>, CacheKey) {
        let cache = StaleCache::new(CacheConfig::default());
        let coalescer = RequestCoalescer::new(Duration::from_millis(1000));
        (cache, coalescer, CacheKey::workload_stats(&"all"))
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_skips_backend() {
        let (cache, coalescer, key) = fixtures();
        cache.put(&key, 5u32);

        let outcome = read_through(&cache, &coalescer, &key, false, || async {
            Err(RepoError::Timeout)
        })
        .await
        .expect("cached");
        assert_eq!(outcome, Fetched::fresh(5));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_falls_back_to_stale_entry() {
        let (cache, coalescer, key) = fixtures();
        cache.put(&key, 5u32);
        tokio::time::advance(Duration::from_secs(600)).await;

        let outcome = read_through(&cache, &coalescer, &key, false, || async {
            Err(RepoError::Unavailable("502".into()))
        })
        .await
        .expect("fallback");
        assert_eq!(outcome.data, 5);
        assert!(outcome.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_cached_value_surfaces() {
        let (cache, coalescer, key) = fixtures();
        let error = read_through(&cache, &coalescer, &key, false, || async {
            Err(RepoError::Timeout)
        })
        .await
        .expect_err("nothing cached");
        assert!(error.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn forced_read_refreshes_fresh_entry() {
        let (cache, coalescer, key) = fixtures();
        cache.put(&key, 5u32);

        let outcome = read_through(&cache, &coalescer, &key, true, || async { Ok(6) })
            .await
            .expect("refetched");
        assert_eq!(outcome, Fetched::fresh(6));
        assert_eq!(cache.get::<u32>(&key).expect("stored").data, 6);
    }
}
