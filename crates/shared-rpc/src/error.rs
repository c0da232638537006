//! RPC error types.

use crate::config::ConfigError;
use crate::correlation::CorrelationId;
use shared_broker::BrokerError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by RPC clients and workers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Broker connection, channel, publish or consume failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// No correlated reply arrived within the bound.
    #[error("call to {queue} timed out after {timeout:?}")]
    Timeout { queue: String, timeout: Duration },

    /// A reply carried a token no pending call is waiting for.
    ///
    /// Counted and logged by the reply listener, never returned to a caller.
    #[error("no pending call for correlation id {0}")]
    CorrelationMismatch(CorrelationId),

    /// Malformed payload or missing routing metadata.
    #[error("decode error: {0}")]
    Decode(String),

    /// Client or worker settings rejected before any broker work.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A call with this correlation id is already pending.
    #[error("correlation id already in use: {0}")]
    CorrelationInUse(CorrelationId),

    /// The client was shut down.
    #[error("rpc client closed")]
    Closed,
}

impl RpcError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RpcError::Transport(_) => "transport",
            RpcError::Timeout { .. } => "timeout",
            RpcError::CorrelationMismatch(_) => "correlation_mismatch",
            RpcError::Decode(_) => "decode",
            RpcError::Config(_) => "config",
            RpcError::CorrelationInUse(_) => "correlation_in_use",
            RpcError::Closed => "closed",
        }
    }

    /// Check whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }
}

impl From<BrokerError> for RpcError {
    fn from(e: BrokerError) -> Self {
        RpcError::Transport(e.to_string())
    }
}

impl From<ConfigError> for RpcError {
    fn from(e: ConfigError) -> Self {
        RpcError::Config(e.to_string())
    }
}
