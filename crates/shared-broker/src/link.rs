//! # Broker Link
//!
//! The port through which RPC clients and workers talk to a broker. One link
//! corresponds to one broker channel: consumers, prefetch limits and exclusive
//! queues are scoped to it.

use crate::error::BrokerError;
use crate::message::Message;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Stream of deliveries from a consumer.
///
/// Ends (`None`) when the consumer is cancelled or its channel closes.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, BrokerError>> + Send>>;

/// Queue declaration flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueOptions {
    /// Queue survives a broker restart.
    pub durable: bool,
    /// Queue is private to the declaring channel and deleted when it closes.
    pub exclusive: bool,
    /// Queue is deleted once its last consumer goes away.
    pub auto_delete: bool,
}

impl QueueOptions {
    /// Flags for a well-known request queue shared by competing workers.
    #[must_use]
    pub fn work_queue() -> Self {
        Self::default()
    }

    /// Flags for a private, anonymous reply queue.
    #[must_use]
    pub fn reply_queue() -> Self {
        Self {
            durable: false,
            exclusive: true,
            auto_delete: true,
        }
    }
}

/// Consumer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeOptions {
    /// Broker considers deliveries acknowledged as soon as they are sent.
    pub auto_ack: bool,
    /// Maximum unacknowledged deliveries held by this consumer (0 = unlimited).
    /// Ignored when `auto_ack` is set.
    pub prefetch: u16,
}

impl ConsumeOptions {
    /// Auto-acknowledged consumption, as used for reply queues.
    #[must_use]
    pub fn auto_ack() -> Self {
        Self {
            auto_ack: true,
            prefetch: 0,
        }
    }

    /// Manually acknowledged consumption limited to `prefetch` in-flight deliveries.
    #[must_use]
    pub fn manual_ack(prefetch: u16) -> Self {
        Self {
            auto_ack: false,
            prefetch,
        }
    }
}

/// Settles a delivery with the broker.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    /// Positively acknowledge the delivery.
    async fn ack(&self) -> Result<(), BrokerError>;

    /// Negatively acknowledge the delivery, optionally returning it to the queue.
    async fn nack(&self, requeue: bool) -> Result<(), BrokerError>;
}

/// Acknowledger for deliveries the broker already considers settled.
struct AutoAcked;

#[async_trait]
impl Acknowledge for AutoAcked {
    async fn ack(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn nack(&self, _requeue: bool) -> Result<(), BrokerError> {
        Ok(())
    }
}

/// A message delivered to a consumer, together with its acknowledgement handle.
pub struct Delivery {
    /// The delivered message.
    pub message: Message,
    /// The broker delivered this message before without it being acknowledged.
    pub redelivered: bool,
    acker: Arc<dyn Acknowledge>,
}

impl Delivery {
    /// Create a delivery that must be settled through `acker`.
    pub fn new(message: Message, redelivered: bool, acker: Arc<dyn Acknowledge>) -> Self {
        Self {
            message,
            redelivered,
            acker,
        }
    }

    /// Create a delivery from an auto-acknowledging consumer.
    pub fn auto_acked(message: Message) -> Self {
        Self::new(message, false, Arc::new(AutoAcked))
    }

    /// Acknowledge the delivery.
    pub async fn ack(&self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    /// Negatively acknowledge and return the delivery to its queue.
    pub async fn requeue(&self) -> Result<(), BrokerError> {
        self.acker.nack(true).await
    }

    /// Negatively acknowledge without requeueing (dead-letter if configured).
    pub async fn reject(&self) -> Result<(), BrokerError> {
        self.acker.nack(false).await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .field("redelivered", &self.redelivered)
            .finish_non_exhaustive()
    }
}

/// A channel to a message broker.
#[async_trait]
pub trait BrokerLink: Send + Sync {
    /// Declare a queue, returning its name.
    ///
    /// An empty `name` asks the broker to generate one. Declaring an existing
    /// queue is idempotent.
    async fn declare_queue(&self, name: &str, options: QueueOptions) -> Result<String, BrokerError>;

    /// Publish a message to `queue` through the default exchange.
    ///
    /// A message addressed to a queue that does not exist is dropped by the
    /// broker, mirroring AMQP's non-mandatory publish.
    async fn publish(&self, queue: &str, message: Message) -> Result<(), BrokerError>;

    /// Start consuming from `queue`.
    async fn consume(&self, queue: &str, options: ConsumeOptions)
        -> Result<DeliveryStream, BrokerError>;

    /// Close the channel. Exclusive queues it declared are deleted and
    /// unacknowledged deliveries return to their queues.
    async fn close(&self) -> Result<(), BrokerError>;
}
