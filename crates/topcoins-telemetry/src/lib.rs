//! # Top-Coins Telemetry
//!
//! Observability shared by the pricing worker, the ranking worker and the
//! gateway.
//!
//! ## Components
//!
//! - **Logs**: `tracing` events, human-readable locally and JSON in containers
//! - **Metrics**: Prometheus counters and histograms for RPC calls and worker
//!   deliveries, exposed by the gateway on `/metrics`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use topcoins_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_telemetry(&TelemetryConfig::for_service("tc-pricing"))?;
//!     // Logs and metrics are now being collected
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TC_SERVICE_NAME` | `top-coins` | Service name in log lines |
//! | `TC_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `TC_JSON_LOGS` | auto | JSON output; on by default inside containers |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, metrics_content_type, record_rpc_call, record_unmatched_reply,
    record_worker_delivery, register_metrics, RPC_CALLS, RPC_CALL_DURATION,
    RPC_UNMATCHED_REPLIES, WORKER_DELIVERIES,
};

use thiserror::Error;

/// Errors that can occur during telemetry initialization.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install the global log subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)
}
