//! Upstream API configuration.

use std::time::Duration;
use thiserror::Error;

/// CryptoCompare top-by-market-cap endpoint.
pub const DEFAULT_API_URL: &str = "https://min-api.cryptocompare.com/data/top/mktcapfull";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankingConfigError {
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

/// CryptoCompare client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Top list endpoint
    pub api_url: String,
    /// Bound on one page request (default: 10s)
    pub request_timeout: Duration,
    /// Bound on establishing the connection (default: 3s)
    pub connect_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(3),
        }
    }
}

impl UpstreamConfig {
    pub fn validate(&self) -> Result<(), RankingConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(RankingConfigError::InvalidUrl(self.api_url.clone()));
        }
        if self.request_timeout.is_zero() {
            return Err(RankingConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
