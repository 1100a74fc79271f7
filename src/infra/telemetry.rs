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
use super::log_sink;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// When the remote sink is enabled its shipper is spawned on the current tokio runtime.
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

    let sink_layer = if logging.sink.enabled {
        let (layer, shipper) = log_sink::channel(&logging.sink)?;
        tokio::spawn(shipper.run());
        Some(layer.with_filter(logging.level))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .with(sink_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "trendcache_cache_hit_total",
            Unit::Count,
            "Total number of listing lookups served from cache."
        );
        describe_counter!(
            "trendcache_cache_miss_total",
            Unit::Count,
            "Total number of listing lookups that went upstream."
        );
        describe_counter!(
            "trendcache_cache_decode_error_total",
            Unit::Count,
            "Total number of cache entries discarded because they could not be decoded."
        );
        describe_counter!(
            "trendcache_cache_read_error_total",
            Unit::Count,
            "Total number of cache reads that failed and degraded to a miss."
        );
        describe_counter!(
            "trendcache_cache_write_error_total",
            Unit::Count,
            "Total number of cache writes that failed."
        );
        describe_counter!(
            "trendcache_upstream_failure_total",
            Unit::Count,
            "Total number of upstream listing failures, labelled by kind."
        );
        describe_counter!(
            "trendcache_upstream_probe_total",
            Unit::Count,
            "Total number of channel existence probes, labelled by outcome."
        );
        describe_histogram!(
            "trendcache_upstream_fetch_ms",
            Unit::Milliseconds,
            "Upstream listing latency in milliseconds."
        );
        describe_histogram!(
            "trendcache_http_request_ms",
            Unit::Milliseconds,
            "HTTP request latency in milliseconds, labelled by response status."
        );
        describe_counter!(
            "trendcache_log_sink_dropped_total",
            Unit::Count,
            "Total number of log entries dropped because the sink queue was full."
        );
    });
}
