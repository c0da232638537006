//! The processing capability a worker delegates to.

use crate::payload::FetchParams;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors from a fetch capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The upstream service could not be reached.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The upstream service answered with a non-success status.
    #[error("upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The upstream response could not be interpreted.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    /// The result could not be encoded as a reply body.
    #[error("failed to encode result: {0}")]
    Encode(String),
}

/// Produces a reply body for a decoded request.
///
/// Implementations may perform network I/O; they must not panic on
/// upstream failures.
#[async_trait]
pub trait FetchData: Send + Sync {
    async fn fetch(&self, params: FetchParams) -> Result<Bytes, FetchError>;
}
