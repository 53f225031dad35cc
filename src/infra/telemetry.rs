use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
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

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "talentdesk_cache_hit_total",
            Unit::Count,
            "Total number of query cache hits."
        );
        describe_counter!(
            "talentdesk_cache_miss_total",
            Unit::Count,
            "Total number of query cache misses, including bypassed lookups."
        );
        describe_histogram!(
            "talentdesk_cache_lookup_ms",
            Unit::Milliseconds,
            "Cache lookup latency in milliseconds, labelled by outcome."
        );
        describe_counter!(
            "talentdesk_cache_store_evict_total",
            Unit::Count,
            "Total number of entries evicted from a cache store due to capacity."
        );
        describe_counter!(
            "talentdesk_cache_index_track_error_total",
            Unit::Count,
            "Total number of failures recording a key in the hash index."
        );
        describe_counter!(
            "talentdesk_cache_write_error_total",
            Unit::Count,
            "Total number of cache writes that failed after a successful query."
        );
        describe_counter!(
            "talentdesk_cache_invalidation_total",
            Unit::Count,
            "Total number of cache invalidations, labelled by scope."
        );
        describe_counter!(
            "talentdesk_cache_bypass_total",
            Unit::Count,
            "Total number of requests that bypassed the cache via the debug header."
        );
        describe_counter!(
            "talentdesk_cache_purged_total",
            Unit::Count,
            "Total number of expired entries purged from the distributed store."
        );
    });
}
