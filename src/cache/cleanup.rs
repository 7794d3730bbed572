//! Periodic cleanup sweep.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Run `sweep` every `interval` until the returned handle is aborted.
///
/// `sweep` returns how many entries it removed.
pub fn spawn_cleanup<F>(interval: Duration, sweep: F) -> JoinHandle<()>
where
    F: Fn() -> usize + Send + 'static,
{
    info!(interval_secs = interval.as_secs(), "Starting cache cleanup task");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // Skip the first immediate tick
        loop {
            ticker.tick().await;
            let removed = sweep();
            debug!(removed, "cache cleanup sweep finished");
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::StaleCache;

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_each_tick() {
        let cache = Arc::new(StaleCache::default());
        cache.set("workload:stats:a", 1u8, Duration::from_secs(1));

        let sweeper = Arc::clone(&cache);
        let handle = spawn_cleanup(Duration::from_secs(10), move || sweeper.cleanup());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(cache.is_empty());

        handle.abort();
        let _ = handle.await;
    }
}
