//! # Broker Errors
//!
//! Every failure surfaced by a broker link. All of them are transport-class
//! from the point of view of the RPC layer.

use thiserror::Error;

/// Errors from broker link operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The connection to the broker could not be established or was lost.
    #[error("Broker connection failed: {0}")]
    Connection(String),

    /// The channel was closed (locally or by the broker).
    #[error("Broker channel closed")]
    ChannelClosed,

    /// The queue does not exist.
    #[error("Queue {0} not found")]
    QueueNotFound(String),

    /// The queue is exclusive to another channel.
    #[error("Queue {0} is exclusive to another channel")]
    QueueLocked(String),

    /// Queue declaration was refused.
    #[error("Queue declaration failed: {0}")]
    Declare(String),

    /// Publishing a message failed.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Starting or running a consumer failed.
    #[error("Consume failed: {0}")]
    Consume(String),

    /// Acknowledging, rejecting or requeueing a delivery failed.
    #[error("Acknowledgement failed: {0}")]
    Ack(String),
}

#[cfg(feature = "amqp")]
impl From<lapin::Error> for BrokerError {
    fn from(err: lapin::Error) -> Self {
        match err {
            lapin::Error::InvalidChannelState(_) => BrokerError::ChannelClosed,
            lapin::Error::InvalidConnectionState(_) | lapin::Error::IOError(_) => {
                BrokerError::Connection(err.to_string())
            }
            other => BrokerError::Consume(other.to_string()),
        }
    }
}
