use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::{bulk::METRIC_BULK_APPLY_MS, outcome::METRIC_CACHE_FALLBACK};
use crate::cache::{
    METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATED, METRIC_CACHE_MISS, METRIC_CACHE_STALE,
    METRIC_CACHE_SWEPT, METRIC_FETCH_COALESCED,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    // Logs go to stderr; stdout carries command output.
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the engine emits. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Cache reads answered by an unexpired entry."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Cache reads that found no usable entry."
        );
        describe_counter!(
            METRIC_CACHE_STALE,
            Unit::Count,
            "Cache reads answered by an entry past its TTL."
        );
        describe_counter!(
            METRIC_CACHE_FALLBACK,
            Unit::Count,
            "Failed fetches answered with the last cached value."
        );
        describe_counter!(
            METRIC_CACHE_INVALIDATED,
            Unit::Count,
            "Cache entries removed by invalidation."
        );
        describe_counter!(
            METRIC_CACHE_SWEPT,
            Unit::Count,
            "Cache entries removed by the periodic cleanup sweep."
        );
        describe_counter!(
            METRIC_FETCH_COALESCED,
            Unit::Count,
            "Fetches that joined an identical fetch instead of calling the backend."
        );
        describe_histogram!(
            METRIC_BULK_APPLY_MS,
            Unit::Milliseconds,
            "Time for a bulk mutation to settle every item, in milliseconds."
        );
    });
}
