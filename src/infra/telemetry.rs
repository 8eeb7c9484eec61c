use std::sync::Once;

use metrics::{Unit, describe_counter};
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
            "whelmed_cache_remote_hit_total",
            Unit::Count,
            "Reads answered by the remote cache."
        );
        describe_counter!(
            "whelmed_cache_remote_miss_total",
            Unit::Count,
            "Reads the remote cache had no entry for."
        );
        describe_counter!(
            "whelmed_cache_remote_error_total",
            Unit::Count,
            "Remote cache operations that failed and fell back to memory."
        );
        describe_counter!(
            "whelmed_cache_local_hit_total",
            Unit::Count,
            "Reads answered by the in-memory store."
        );
        describe_counter!(
            "whelmed_cache_local_miss_total",
            Unit::Count,
            "Reads with no live in-memory entry."
        );
        describe_counter!(
            "whelmed_cache_local_evict_total",
            Unit::Count,
            "In-memory entries evicted due to capacity."
        );
    });
}
