//! Stale-tolerant cache shared by every read-heavy data domain.
//!
//! - **Store**: namespaced TTL entries that are served stale instead of dropped
//! - **Keys**: `<namespace>:<rest>` keys plus exact/prefix invalidation patterns
//! - **Coalescing**: identical concurrent fetches share one backing call
//! - **Cleanup**: periodic sweep bounding memory independent of access patterns
//!
//! ## Configuration
//!
//! TTLs are set per namespace in the `[cache]` settings table:
//!
//! ```toml
//! [cache]
//! workload_ttl_secs = 120
//! catalog_ttl_secs = 1800
//! # ... see config.rs for all options
//! ```

pub mod cleanup;
mod coalesce;
mod config;
mod keys;
mod lock;
mod store;

pub use coalesce::RequestCoalescer;
pub use config::CacheConfig;
pub use keys::{CacheKey, KeyPattern, Namespace, hash_value};
pub use store::{Cached, StaleCache};

pub(crate) use lock::{rw_read, rw_write};
pub(crate) use coalesce::METRIC_FETCH_COALESCED;
pub(crate) use store::{
    METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATED, METRIC_CACHE_MISS, METRIC_CACHE_STALE,
    METRIC_CACHE_SWEPT,
};
