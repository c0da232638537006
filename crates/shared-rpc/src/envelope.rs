//! Request and reply envelopes.
//!
//! An envelope is the routing metadata of one RPC leg plus its opaque body.
//! Envelopes are built once and converted into broker messages; decoding a
//! delivered message fails with [`RpcError::Decode`] when metadata the leg
//! depends on is missing.

use crate::correlation::CorrelationId;
use crate::error::RpcError;
use bytes::Bytes;
use shared_broker::{Message, MessageProperties, TEXT_PLAIN};

/// A request published by a client to a work queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub correlation_id: CorrelationId,
    pub reply_to: String,
    pub content_type: String,
    pub body: Bytes,
}

impl RequestEnvelope {
    /// Create a `text/plain` request.
    pub fn new(correlation_id: CorrelationId, reply_to: impl Into<String>, body: Bytes) -> Self {
        Self {
            correlation_id,
            reply_to: reply_to.into(),
            content_type: TEXT_PLAIN.to_string(),
            body,
        }
    }

    /// Convert into a broker message.
    pub fn into_message(self) -> Message {
        let properties = MessageProperties::default()
            .with_correlation_id(self.correlation_id.as_str())
            .with_reply_to(self.reply_to)
            .with_content_type(self.content_type);
        Message::new(properties, self.body)
    }

    /// Decode a delivered request. Both the token and the reply address are required.
    pub fn from_message(message: &Message) -> Result<Self, RpcError> {
        let correlation_id = required(message.correlation_id(), "correlation id")?;
        let reply_to = required(message.reply_to(), "reply-to")?;
        Ok(Self {
            correlation_id: CorrelationId::from(correlation_id),
            reply_to: reply_to.to_string(),
            content_type: message.content_type().unwrap_or(TEXT_PLAIN).to_string(),
            body: message.body.clone(),
        })
    }
}

/// A reply published by a worker to a client's reply queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    pub correlation_id: CorrelationId,
    pub body: Bytes,
}

impl ReplyEnvelope {
    /// Create a reply echoing the request's token.
    pub fn new(correlation_id: CorrelationId, body: Bytes) -> Self {
        Self {
            correlation_id,
            body,
        }
    }

    /// Convert into a broker message.
    pub fn into_message(self) -> Message {
        let properties = MessageProperties::default()
            .with_correlation_id(self.correlation_id.as_str())
            .with_content_type(TEXT_PLAIN);
        Message::new(properties, self.body)
    }

    /// Decode a delivered reply.
    pub fn from_message(message: &Message) -> Result<Self, RpcError> {
        let correlation_id = required(message.correlation_id(), "correlation id")?;
        Ok(Self {
            correlation_id: CorrelationId::from(correlation_id),
            body: message.body.clone(),
        })
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, RpcError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RpcError::Decode(format!("missing {field}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_routing_metadata() {
        let request = RequestEnvelope::new(
            CorrelationId::from("A1B2"),
            "amq.gen-reply",
            Bytes::from_static(b"200"),
        );
        let message = request.into_message();

        assert_eq!(message.correlation_id(), Some("A1B2"));
        assert_eq!(message.reply_to(), Some("amq.gen-reply"));
        assert_eq!(message.content_type(), Some(TEXT_PLAIN));
        assert_eq!(&message.body[..], b"200");
    }

    #[test]
    fn test_request_without_reply_to_is_rejected() {
        let message = Message::new(
            MessageProperties::default().with_correlation_id("A1B2"),
            "200",
        );
        assert_eq!(
            RequestEnvelope::from_message(&message),
            Err(RpcError::Decode("missing reply-to".into()))
        );
    }

    #[test]
    fn test_request_with_empty_token_is_rejected() {
        let message = Message::new(
            MessageProperties::default()
                .with_correlation_id("")
                .with_reply_to("amq.gen-reply"),
            "200",
        );
        assert!(matches!(
            RequestEnvelope::from_message(&message),
            Err(RpcError::Decode(_))
        ));
    }

    #[test]
    fn test_reply_decodes_token_and_body() {
        let message = ReplyEnvelope::new(CorrelationId::from("C3D4"), Bytes::from_static(b"[]"))
            .into_message();
        let reply = ReplyEnvelope::from_message(&message).unwrap();
        assert_eq!(reply.correlation_id.as_str(), "C3D4");
        assert_eq!(&reply.body[..], b"[]");
    }

    #[test]
    fn test_reply_without_token_is_rejected() {
        let message = Message::new(MessageProperties::default(), "[]");
        assert!(ReplyEnvelope::from_message(&message).is_err());
    }
}
