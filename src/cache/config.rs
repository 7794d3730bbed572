//! Cache configuration.
//!
//! TTLs are configured per [`Namespace`]; call sites never carry their own.

use std::time::Duration;

use serde::Deserialize;

use super::keys::Namespace;

// Default values for cache configuration
const DEFAULT_SPECIALIZATIONS_TTL_SECS: u64 = 5 * 60;
const DEFAULT_WORKLOAD_TTL_SECS: u64 = 2 * 60;
const DEFAULT_CATALOG_TTL_SECS: u64 = 30 * 60;
const DEFAULT_CATEGORIES_TTL_SECS: u64 = 15 * 60;
const DEFAULT_TICKETS_TTL_SECS: u64 = 60;
const DEFAULT_COALESCE_WINDOW_MS: u64 = 1000;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_STALE_MULTIPLIER: u32 = 3;

/// Cache configuration, deserialized from the `[cache]` settings table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for specialization listings and records.
    pub specializations_ttl_secs: u64,
    /// TTL for workload statistics; short because counts move constantly.
    pub workload_ttl_secs: u64,
    /// TTL for the FAQ catalog.
    pub catalog_ttl_secs: u64,
    /// TTL for categories.
    pub categories_ttl_secs: u64,
    /// TTL for ticket listings.
    pub tickets_ttl_secs: u64,
    /// Window (ms) in which identical fetches share one backing call.
    pub coalesce_window_ms: u64,
    /// Interval (s) between background cleanup sweeps.
    pub cleanup_interval_secs: u64,
    /// Entries older than `ttl * stale_multiplier` are dropped by cleanup.
    pub stale_multiplier: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            specializations_ttl_secs: DEFAULT_SPECIALIZATIONS_TTL_SECS,
            workload_ttl_secs: DEFAULT_WORKLOAD_TTL_SECS,
            catalog_ttl_secs: DEFAULT_CATALOG_TTL_SECS,
            categories_ttl_secs: DEFAULT_CATEGORIES_TTL_SECS,
            tickets_ttl_secs: DEFAULT_TICKETS_TTL_SECS,
            coalesce_window_ms: DEFAULT_COALESCE_WINDOW_MS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            stale_multiplier: DEFAULT_STALE_MULTIPLIER,
        }
    }
}

impl CacheConfig {
    /// TTL applied to entries written into `namespace`.
    pub fn ttl_for(&self, namespace: Namespace) -> Duration {
        let secs = match namespace {
            Namespace::Specializations => self.specializations_ttl_secs,
            Namespace::Workload => self.workload_ttl_secs,
            Namespace::Faqs => self.catalog_ttl_secs,
            Namespace::Categories => self.categories_ttl_secs,
            Namespace::Tickets => self.tickets_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    /// Returns the stale multiplier, clamping to 1 if zero.
    pub fn stale_multiplier_non_zero(&self) -> u32 {
        self.stale_multiplier.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl_for(Namespace::Workload), Duration::from_secs(120));
        assert_eq!(
            config.ttl_for(Namespace::Specializations),
            Duration::from_secs(300)
        );
        assert_eq!(config.ttl_for(Namespace::Faqs), Duration::from_secs(1800));
        assert_eq!(
            config.ttl_for(Namespace::Categories),
            Duration::from_secs(900)
        );
        assert_eq!(config.coalesce_window(), Duration::from_secs(1));
        assert_eq!(config.stale_multiplier, 3);
    }

    #[test]
    fn workload_ttl_is_shorter_than_catalog_ttl() {
        let config = CacheConfig::default();
        assert!(config.ttl_for(Namespace::Workload) < config.ttl_for(Namespace::Faqs));
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            stale_multiplier: 0,
            cleanup_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.stale_multiplier_non_zero(), 1);
        assert_eq!(config.cleanup_interval(), Duration::from_secs(1));
    }
}
