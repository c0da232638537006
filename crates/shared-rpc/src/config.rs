//! RPC client and worker configuration with validation.
//!
//! Defaults are documented on each field; `with_env_overrides` applies the
//! `TC_`-prefixed environment variables on top.

use crate::correlation::TokenStrategy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default bound on one RPC round trip.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of unacknowledged requests a worker holds.
pub const DEFAULT_PREFETCH: u16 = 1;

/// Default upper bound on the record count a request may ask for.
pub const DEFAULT_MAX_COUNT: usize = 5000;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("call timeout must be greater than zero")]
    ZeroTimeout,

    #[error("queue name cannot be empty")]
    EmptyQueue,

    #[error("prefetch must be at least 1")]
    ZeroPrefetch,

    #[error("invalid count limits: {0}")]
    InvalidCount(String),

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },
}

/// RPC client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on one call, from publish to matched reply (default: 5s)
    #[serde(with = "duration_format")]
    pub call_timeout: Duration,
    /// Correlation token strategy (default: random)
    pub token_strategy: TokenStrategy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            token_strategy: TokenStrategy::Random,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.call_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Apply environment overrides.
    ///
    /// - `TC_CALL_TIMEOUT`: humantime duration, e.g. `5s`, `750ms`
    /// - `TC_TOKEN_STRATEGY`: `random` or `sequential`
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(value) = env_var("TC_CALL_TIMEOUT") {
            self.call_timeout = parse_duration("TC_CALL_TIMEOUT", &value)?;
        }
        if let Some(value) = env_var("TC_TOKEN_STRATEGY") {
            self.token_strategy = parse_env("TC_TOKEN_STRATEGY", &value)?;
        }
        Ok(self)
    }
}

/// RPC worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Work queue to consume requests from
    pub queue: String,
    /// Unacknowledged requests held at once (default: 1, strictly sequential)
    pub prefetch: u16,
    /// Record count used when a request body is empty
    pub default_count: usize,
    /// Largest record count a request may ask for (default: 5000)
    pub max_count: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue: crate::PRICING_QUEUE.to_string(),
            prefetch: DEFAULT_PREFETCH,
            default_count: 100,
            max_count: DEFAULT_MAX_COUNT,
        }
    }
}

impl WorkerConfig {
    /// Configuration for a worker on `queue` with the given default count.
    pub fn for_queue(queue: impl Into<String>, default_count: usize) -> Self {
        Self {
            queue: queue.into(),
            default_count,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.is_empty() {
            return Err(ConfigError::EmptyQueue);
        }
        if self.prefetch == 0 {
            return Err(ConfigError::ZeroPrefetch);
        }
        if self.max_count == 0 {
            return Err(ConfigError::InvalidCount("max_count cannot be 0".into()));
        }
        if self.default_count == 0 || self.default_count > self.max_count {
            return Err(ConfigError::InvalidCount(format!(
                "default_count {} must be between 1 and {}",
                self.default_count, self.max_count
            )));
        }
        Ok(())
    }

    /// Apply environment overrides.
    ///
    /// - `TC_QUEUE`: work queue name
    /// - `TC_PREFETCH`: prefetch count
    /// - `TC_DEFAULT_COUNT`: count for empty request bodies
    /// - `TC_MAX_COUNT`: largest accepted count
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(value) = env_var("TC_QUEUE") {
            self.queue = value;
        }
        if let Some(value) = env_var("TC_PREFETCH") {
            self.prefetch = parse_env("TC_PREFETCH", &value)?;
        }
        if let Some(value) = env_var("TC_DEFAULT_COUNT") {
            self.default_count = parse_env("TC_DEFAULT_COUNT", &value)?;
        }
        if let Some(value) = env_var("TC_MAX_COUNT") {
            self.max_count = parse_env("TC_MAX_COUNT", &value)?;
        }
        Ok(self)
    }
}

fn env_var(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

fn parse_duration(var: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// Humantime serde module for Duration fields (`5s`, `750ms`, `1m 30s`)
mod duration_format {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
    }
}
