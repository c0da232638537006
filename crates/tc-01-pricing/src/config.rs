//! Upstream API configuration.

use std::env;
use std::time::Duration;
use thiserror::Error;

/// CoinMarketCap listings endpoint.
pub const DEFAULT_API_URL: &str =
    "https://pro-api.coinmarketcap.com/v1/cryptocurrency/listings/latest";

/// Environment variable holding the CoinMarketCap API key.
pub const API_KEY_VAR: &str = "TC_CMC_API_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingConfigError {
    #[error("TC_CMC_API_KEY is not set")]
    MissingApiKey,

    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
}

/// CoinMarketCap client configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Listings endpoint
    pub api_url: String,
    /// API key, sent as `X-CMC_PRO_API_KEY`
    pub api_key: String,
    /// Bound on one upstream request (default: 10s)
    pub request_timeout: Duration,
    /// Bound on establishing the connection (default: 3s)
    pub connect_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(3),
        }
    }
}

impl UpstreamConfig {
    /// Defaults with the API key taken from the environment.
    pub fn from_env() -> Self {
        Self {
            api_key: env::var(API_KEY_VAR).unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), PricingConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(PricingConfigError::MissingApiKey);
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(PricingConfigError::InvalidUrl(self.api_url.clone()));
        }
        Ok(())
    }
}

// Keeps the API key out of logs
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
