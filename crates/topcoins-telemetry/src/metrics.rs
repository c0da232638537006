//! Prometheus metrics for Top-Coins services.
//!
//! All metrics follow the naming convention: `tc_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., rpc_calls_total)
//! - **Histogram**: Distribution of values (e.g., rpc_call_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use std::time::Duration;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // RPC CLIENT METRICS
    // =========================================================================

    /// Completed RPC calls by request queue and outcome
    pub static ref RPC_CALLS: IntCounterVec = IntCounterVec::new(
        Opts::new("tc_rpc_calls_total", "Total RPC calls issued"),
        &["queue", "outcome"]  // outcome: ok/timeout/transport/closed
    ).expect("metric creation failed");

    /// RPC round-trip duration
    pub static ref RPC_CALL_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "tc_rpc_call_duration_seconds",
            "Time from request publish to matched reply"
        ).buckets(exponential_buckets(0.001, 2.0, 14).expect("valid buckets")),
        &["queue"]
    ).expect("metric creation failed");

    /// Replies whose correlation token matched no pending call
    pub static ref RPC_UNMATCHED_REPLIES: IntCounter = IntCounter::new(
        "tc_rpc_unmatched_replies_total",
        "Replies discarded because no pending call carried their token"
    ).expect("metric creation failed");

    // =========================================================================
    // RPC WORKER METRICS
    // =========================================================================

    /// Settled deliveries by request queue and outcome
    pub static ref WORKER_DELIVERIES: IntCounterVec = IntCounterVec::new(
        Opts::new("tc_worker_deliveries_total", "Total request deliveries settled by workers"),
        &["queue", "outcome"]  // outcome: replied/rejected/requeued
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; metrics that are already registered are
/// left in place.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RPC_CALLS.clone()),
        Box::new(RPC_CALL_DURATION.clone()),
        Box::new(RPC_UNMATCHED_REPLIES.clone()),
        Box::new(WORKER_DELIVERIES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Content type of [`encode_metrics`] output.
pub fn metrics_content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

/// Record a finished RPC call.
pub fn record_rpc_call(queue: &str, outcome: &str, elapsed: Duration) {
    RPC_CALLS.with_label_values(&[queue, outcome]).inc();
    RPC_CALL_DURATION
        .with_label_values(&[queue])
        .observe(elapsed.as_secs_f64());
}

/// Record a reply that matched no pending call.
pub fn record_unmatched_reply() {
    RPC_UNMATCHED_REPLIES.inc();
}

/// Record how a worker settled a delivery.
pub fn record_worker_delivery(queue: &str, outcome: &str) {
    WORKER_DELIVERIES.with_label_values(&[queue, outcome]).inc();
}
