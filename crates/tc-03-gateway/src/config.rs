//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use shared_rpc::{PRICING_QUEUE, RANKING_QUEUE};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

/// Records requested from each worker per HTTP request.
pub const DEFAULT_PER_CALL_LIMIT: usize = 100;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayConfigError {
    #[error("queue name cannot be empty")]
    EmptyQueue,

    #[error("pricing and ranking queues must differ")]
    SameQueue,

    #[error("per-call limit must be greater than zero")]
    ZeroLimit,

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },
}

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address (default: 0.0.0.0)
    pub host: IpAddr,
    /// HTTP port (default: 8080)
    pub port: u16,
    /// Queue served by pricing workers
    pub pricing_queue: String,
    /// Queue served by ranking workers
    pub ranking_queue: String,
    /// Records requested from each worker (default: 100)
    pub per_call_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            pricing_queue: PRICING_QUEUE.to_string(),
            ranking_queue: RANKING_QUEUE.to_string(),
            per_call_limit: DEFAULT_PER_CALL_LIMIT,
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), GatewayConfigError> {
        if self.pricing_queue.is_empty() || self.ranking_queue.is_empty() {
            return Err(GatewayConfigError::EmptyQueue);
        }
        if self.pricing_queue == self.ranking_queue {
            return Err(GatewayConfigError::SameQueue);
        }
        if self.per_call_limit == 0 {
            return Err(GatewayConfigError::ZeroLimit);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Apply environment overrides.
    ///
    /// - `TC_GATEWAY_HOST`, `TC_GATEWAY_PORT`
    /// - `TC_PRICING_QUEUE`, `TC_RANKING_QUEUE`
    /// - `TC_GATEWAY_LIMIT`: records requested per call
    pub fn with_env_overrides(mut self) -> Result<Self, GatewayConfigError> {
        if let Some(value) = env_var("TC_GATEWAY_HOST") {
            self.host = parse_env("TC_GATEWAY_HOST", &value)?;
        }
        if let Some(value) = env_var("TC_GATEWAY_PORT") {
            self.port = parse_env("TC_GATEWAY_PORT", &value)?;
        }
        if let Some(value) = env_var("TC_PRICING_QUEUE") {
            self.pricing_queue = value;
        }
        if let Some(value) = env_var("TC_RANKING_QUEUE") {
            self.ranking_queue = value;
        }
        if let Some(value) = env_var("TC_GATEWAY_LIMIT") {
            self.per_call_limit = parse_env("TC_GATEWAY_LIMIT", &value)?;
        }
        Ok(self)
    }
}

fn env_var(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, GatewayConfigError> {
    value.trim().parse().map_err(|_| GatewayConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}
