//! Request coalescing for identical concurrent fetches.
//!
//! The first caller for a key ("leader") starts the backing fetch; every caller
//! arriving while it is in flight, or shortly after it succeeded, awaits the
//! same shared future instead of issuing its own call.
//!
//! Every fetch is tagged with the cache generation it started under. A settled
//! result from an older generation is never joined, so an invalidation always
//! sends the next read to the backend.

use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

pub(crate) const METRIC_FETCH_COALESCED: &str = "deskroute_fetch_coalesced_total";

struct InFlight<V, E>
where
    V: Clone,
    E: Clone,
{
    started_at: Instant,
    generation: u64,
    future: Shared<BoxFuture<'static, Result<V, E>>>,
}

impl<V, E> InFlight<V, E>
where
    V: Clone,
    E: Clone,
{
    /// Pending fetches are always joinable; successful ones only inside the
    /// window; failed ones never, so the next caller retries.
    fn is_joinable(&self, window: Duration) -> bool {
        match self.future.peek() {
            None => true,
            Some(Ok(_)) => self.started_at.elapsed() <= window,
            Some(Err(_)) => false,
        }
    }

    fn is_joinable_at(&self, window: Duration, generation: u64) -> bool {
        self.is_joinable(window)
            && (self.future.peek().is_none() || self.generation == generation)
    }
}

/// Deduplicates fetches keyed by request signature.
pub struct RequestCoalescer<V, E>
where
    V: Clone,
    E: Clone,
{
    window: Duration,
    inflight: DashMap<String, InFlight<V, E>>,
}

impl<V, E> RequestCoalescer<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            inflight: DashMap::new(),
        }
    }

    /// Run `fetch` for `key`, or join an equivalent fetch already under way.
    ///
    /// `generation` is the cache generation observed by the caller; settled
    /// results from any other generation are refetched.
    pub async fn run<F, Fut>(&self, key: &str, generation: u64, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let future = match self.inflight.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_joinable_at(self.window, generation) {
                    counter!(METRIC_FETCH_COALESCED).increment(1);
                    debug!(key, "joining in-flight fetch");
                    occupied.get().future.clone()
                } else {
                    let future = fetch().boxed().shared();
                    occupied.insert(InFlight {
                        started_at: Instant::now(),
                        generation,
                        future: future.clone(),
                    });
                    future
                }
            }
            Entry::Vacant(vacant) => {
                let future = fetch().boxed().shared();
                vacant.insert(InFlight {
                    started_at: Instant::now(),
                    generation,
                    future: future.clone(),
                });
                future
            }
        };

        future.await
    }

    /// Forget settled fetches that can no longer be joined.
    pub fn purge_settled(&self) -> usize {
        let before = self.inflight.len();
        self.inflight
            .retain(|_, inflight| inflight.is_joinable(self.window));
        before.saturating_sub(self.inflight.len())
    }

    /// Drop every settled result so the next `run` reaches the backend.
    /// Pending fetches stay joinable.
    pub fn forget_settled(&self) {
        self.inflight
            .retain(|_, inflight| inflight.future.peek().is_none());
    }

    /// Number of tracked fetches, pending or recently settled.
    pub fn tracked(&self) -> usize {
        self.inflight.len()
    }
}
