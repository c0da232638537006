//! # Broker Messages
//!
//! The transport-level message model: routing properties plus an opaque body.
//! Mirrors the subset of AMQP basic properties the RPC convention relies on.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Content type tag for opaque byte payloads.
pub const TEXT_PLAIN: &str = "text/plain";

/// Routing metadata carried alongside a message body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageProperties {
    /// Token matching a reply to its request.
    pub correlation_id: Option<String>,
    /// Queue the recipient should address its reply to.
    pub reply_to: Option<String>,
    /// Media type of the body.
    pub content_type: Option<String>,
}

impl MessageProperties {
    /// Set the correlation token.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Set the reply-to queue.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Set the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A message as published to, or delivered from, a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Routing metadata.
    pub properties: MessageProperties,
    /// Opaque payload.
    pub body: Bytes,
}

impl Message {
    /// Create a message from properties and a body.
    pub fn new(properties: MessageProperties, body: impl Into<Bytes>) -> Self {
        Self {
            properties,
            body: body.into(),
        }
    }

    /// Correlation token, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        self.properties.correlation_id.as_deref()
    }

    /// Reply-to queue, if any.
    pub fn reply_to(&self) -> Option<&str> {
        self.properties.reply_to.as_deref()
    }

    /// Content type, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.properties.content_type.as_deref()
    }
}
