//! Correlation tokens for request/reply matching.
//!
//! A token travels in the request's properties and is echoed verbatim in the
//! reply. Tokens must be unique among the calls pending on one reply queue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Correlation token carried by a request and its reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap an existing token.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a random token (UUID v4, 32 hex characters).
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Build a token scoped to a reply queue: `<reply_queue>.<sequence>`.
    pub fn sequential(reply_queue: &str, sequence: u64) -> Self {
        Self(format!("{reply_queue}.{sequence}"))
    }

    /// Get the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How a client mints correlation tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStrategy {
    /// Fresh UUID v4 per call.
    #[default]
    Random,
    /// Reply queue name plus a per-client counter.
    Sequential,
}

impl std::str::FromStr for TokenStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" | "uuid" => Ok(TokenStrategy::Random),
            "sequential" | "counter" => Ok(TokenStrategy::Sequential),
            other => Err(format!("unknown token strategy: {other}")),
        }
    }
}

/// Mints correlation tokens for one client.
#[derive(Debug)]
pub struct TokenGenerator {
    strategy: TokenStrategy,
    reply_queue: String,
    counter: AtomicU64,
}

impl TokenGenerator {
    /// Create a generator for the client owning `reply_queue`.
    pub fn new(strategy: TokenStrategy, reply_queue: impl Into<String>) -> Self {
        Self {
            strategy,
            reply_queue: reply_queue.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Mint the next token.
    pub fn next_id(&self) -> CorrelationId {
        match self.strategy {
            TokenStrategy::Random => CorrelationId::random(),
            TokenStrategy::Sequential => {
                let sequence = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
                CorrelationId::sequential(&self.reply_queue, sequence)
            }
        }
    }

    /// The strategy in use.
    pub fn strategy(&self) -> TokenStrategy {
        self.strategy
    }
}
