//! Request body codec.
//!
//! The request body is the ASCII decimal count of records the caller wants,
//! e.g. `200`. Decoding is lenient about framing and strict about the value:
//!
//! - empty body: the worker's default count
//! - surrounding ASCII whitespace: ignored
//! - a JSON-quoted integer (`"200"`): accepted
//! - zero, a count above the worker's maximum, or anything else: rejected

use crate::error::RpcError;
use bytes::Bytes;

/// Input handed to a worker's fetch capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchParams {
    /// Number of records requested.
    pub count: usize,
}

impl FetchParams {
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    /// Encode as a request body.
    pub fn encode(&self) -> Bytes {
        Bytes::from(self.count.to_string())
    }

    /// Decode a request body, applying the worker's default and maximum.
    pub fn decode(body: &[u8], default_count: usize, max_count: usize) -> Result<Self, RpcError> {
        let mut text = body.trim_ascii();
        if text.is_empty() {
            return Ok(Self::new(default_count));
        }
        if text.len() >= 2 && text.first() == Some(&b'"') && text.last() == Some(&b'"') {
            text = text[1..text.len() - 1].trim_ascii();
        }

        if text.is_empty() || !text.iter().all(u8::is_ascii_digit) {
            return Err(RpcError::Decode(format!(
                "request body is not a decimal count: {:?}",
                String::from_utf8_lossy(body)
            )));
        }

        let count = std::str::from_utf8(text)
            .ok()
            .and_then(|digits| digits.parse::<usize>().ok())
            .ok_or_else(|| RpcError::Decode("request count out of range".into()))?;

        if count == 0 {
            return Err(RpcError::Decode("request count must be positive".into()));
        }
        if count > max_count {
            return Err(RpcError::Decode(format!(
                "request count {count} exceeds maximum {max_count}"
            )));
        }
        Ok(Self::new(count))
    }
}
