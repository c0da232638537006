//! # In-Memory Broker
//!
//! A single-process broker with the queue semantics the RPC convention relies
//! on: default-exchange routing by queue name, anonymous exclusive queues,
//! auto-delete, per-consumer prefetch, manual acknowledgement and redelivery of
//! unacknowledged messages when a consumer or channel goes away.
//!
//! Suitable for tests and single-node demos; production deployments use the
//! AMQP adapter.

use crate::error::BrokerError;
use crate::link::{
    Acknowledge, BrokerLink, ConsumeOptions, Delivery, DeliveryStream, QueueOptions,
};
use crate::message::Message;
use async_trait::async_trait;
use futures::Stream;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

type Shared = Arc<Mutex<BrokerState>>;
type WeakShared = Weak<Mutex<BrokerState>>;
type DeliverySender = mpsc::UnboundedSender<Result<Delivery, BrokerError>>;

/// A message waiting in a queue.
struct Queued {
    message: Message,
    redelivered: bool,
}

/// A registered consumer and the deliveries it has not settled yet.
struct Consumer {
    id: u64,
    channel: u64,
    tx: DeliverySender,
    options: ConsumeOptions,
    unacked: HashMap<u64, Message>,
}

impl Consumer {
    fn has_capacity(&self) -> bool {
        self.options.auto_ack
            || self.options.prefetch == 0
            || self.unacked.len() < usize::from(self.options.prefetch)
    }
}

struct QueueState {
    options: QueueOptions,
    owner: u64,
    ready: VecDeque<Queued>,
    consumers: Vec<Consumer>,
    cursor: usize,
}

impl QueueState {
    fn new(options: QueueOptions, owner: u64) -> Self {
        Self {
            options,
            owner,
            ready: VecDeque::new(),
            consumers: Vec::new(),
            cursor: 0,
        }
    }

    fn locked_for(&self, channel: u64) -> bool {
        self.options.exclusive && self.owner != channel
    }

    /// Return unsettled messages to the head of the queue, oldest first.
    fn requeue_unacked(&mut self, unacked: HashMap<u64, Message>) {
        let mut entries: Vec<_> = unacked.into_iter().collect();
        entries.sort_by_key(|(tag, _)| *tag);
        for (_, message) in entries.into_iter().rev() {
            self.ready.push_front(Queued {
                message,
                redelivered: true,
            });
        }
    }

    fn unacked_count(&self) -> usize {
        self.consumers.iter().map(|c| c.unacked.len()).sum()
    }
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    next_channel: u64,
    next_consumer: u64,
    next_tag: u64,
    published: u64,
    dropped: u64,
}

/// Push ready messages to consumers with spare prefetch capacity, round-robin.
fn dispatch(queue_name: &str, queue: &mut QueueState, next_tag: &mut u64, shared: &WeakShared) {
    while !queue.ready.is_empty() && !queue.consumers.is_empty() {
        let count = queue.consumers.len();
        let start = queue.cursor % count;
        let Some(idx) = (0..count)
            .map(|offset| (start + offset) % count)
            .find(|&i| queue.consumers[i].has_capacity())
        else {
            return;
        };
        queue.cursor = (idx + 1) % count;

        let Some(queued) = queue.ready.pop_front() else {
            return;
        };
        let consumer = &mut queue.consumers[idx];

        *next_tag += 1;
        let tag = *next_tag;
        let delivery = if consumer.options.auto_ack {
            let mut delivery = Delivery::auto_acked(queued.message.clone());
            delivery.redelivered = queued.redelivered;
            delivery
        } else {
            consumer.unacked.insert(tag, queued.message.clone());
            let acker = MemoryAcker {
                broker: shared.clone(),
                queue: queue_name.to_string(),
                consumer: consumer.id,
                tag,
            };
            Delivery::new(queued.message.clone(), queued.redelivered, Arc::new(acker))
        };

        if consumer.tx.send(Ok(delivery)).is_err() {
            // Receiver already gone: retire the consumer and keep the message.
            let mut dead = queue.consumers.remove(idx);
            dead.unacked.remove(&tag);
            queue.ready.push_front(queued);
            queue.requeue_unacked(dead.unacked);
            debug!(queue = queue_name, consumer = dead.id, "Retired closed consumer");
        }
    }
}

fn remove_consumer(state: &mut BrokerState, queue_name: &str, consumer_id: u64, shared: &WeakShared) {
    let Some(queue) = state.queues.get_mut(queue_name) else {
        return;
    };
    let Some(pos) = queue.consumers.iter().position(|c| c.id == consumer_id) else {
        return;
    };
    let consumer = queue.consumers.remove(pos);
    queue.requeue_unacked(consumer.unacked);
    debug!(queue = queue_name, consumer = consumer_id, "Consumer cancelled");

    if queue.consumers.is_empty() && queue.options.auto_delete {
        state.queues.remove(queue_name);
        debug!(queue = queue_name, "Auto-deleted queue");
        return;
    }
    dispatch(queue_name, queue, &mut state.next_tag, shared);
}

fn close_channel(state: &mut BrokerState, channel: u64, shared: &WeakShared) {
    let mut doomed = Vec::new();

    for (name, queue) in state.queues.iter_mut() {
        let before = queue.consumers.len();
        let (closing, kept): (Vec<_>, Vec<_>) = queue
            .consumers
            .drain(..)
            .partition(|c| c.channel == channel);
        queue.consumers = kept;
        for consumer in closing {
            queue.requeue_unacked(consumer.unacked);
        }

        let lost_last_consumer = before > 0 && queue.consumers.is_empty();
        if (queue.options.exclusive && queue.owner == channel)
            || (queue.options.auto_delete && lost_last_consumer)
        {
            doomed.push(name.clone());
        }
    }

    for name in doomed {
        state.queues.remove(&name);
        debug!(queue = %name, channel = channel, "Deleted queue on channel close");
    }

    let BrokerState {
        queues, next_tag, ..
    } = state;
    for (name, queue) in queues.iter_mut() {
        dispatch(name, queue, next_tag, shared);
    }
}

/// Settles deliveries made to a manually acknowledging consumer.
struct MemoryAcker {
    broker: WeakShared,
    queue: String,
    consumer: u64,
    tag: u64,
}

impl MemoryAcker {
    fn settle(&self, requeue: Option<bool>) -> Result<(), BrokerError> {
        let shared = self.broker.upgrade().ok_or(BrokerError::ChannelClosed)?;
        let mut guard = shared.lock();
        let BrokerState {
            queues, next_tag, ..
        } = &mut *guard;

        let queue = queues
            .get_mut(&self.queue)
            .ok_or_else(|| BrokerError::QueueNotFound(self.queue.clone()))?;
        let consumer = queue
            .consumers
            .iter_mut()
            .find(|c| c.id == self.consumer)
            .ok_or(BrokerError::ChannelClosed)?;
        let message = consumer
            .unacked
            .remove(&self.tag)
            .ok_or_else(|| BrokerError::Ack(format!("unknown delivery tag {}", self.tag)))?;

        if requeue == Some(true) {
            queue.ready.push_front(Queued {
                message,
                redelivered: true,
            });
        }

        dispatch(&self.queue, queue, next_tag, &self.broker);
        Ok(())
    }
}

#[async_trait]
impl Acknowledge for MemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.settle(None)
    }

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        self.settle(Some(requeue))
    }
}

/// Delivery stream for one in-memory consumer. Dropping it cancels the
/// consumer and requeues whatever it had not settled.
struct MemoryConsumer {
    rx: mpsc::UnboundedReceiver<Result<Delivery, BrokerError>>,
    broker: WeakShared,
    queue: String,
    consumer: u64,
}

impl Stream for MemoryConsumer {
    type Item = Result<Delivery, BrokerError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        let Some(shared) = self.broker.upgrade() else {
            return;
        };
        let mut state = shared.lock();
        remove_consumer(&mut state, &self.queue, self.consumer, &self.broker);
    }
}

/// In-process message broker.
///
/// Cloning yields another handle to the same broker.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Shared,
}

impl InMemoryBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new channel.
    #[must_use]
    pub fn channel(&self) -> InMemoryChannel {
        let id = {
            let mut state = self.state.lock();
            state.next_channel += 1;
            state.next_channel
        };
        debug!(channel = id, "Opened in-memory channel");
        InMemoryChannel {
            id,
            broker: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }
    }

    /// Check whether a queue exists.
    #[must_use]
    pub fn queue_exists(&self, queue: &str) -> bool {
        self.state.lock().queues.contains_key(queue)
    }

    /// Messages waiting in `queue` for a consumer.
    #[must_use]
    pub fn ready_count(&self, queue: &str) -> Option<usize> {
        self.state.lock().queues.get(queue).map(|q| q.ready.len())
    }

    /// Messages delivered from `queue` but not yet settled.
    #[must_use]
    pub fn unacked_count(&self, queue: &str) -> Option<usize> {
        self.state.lock().queues.get(queue).map(QueueState::unacked_count)
    }

    /// Consumers attached to `queue`.
    #[must_use]
    pub fn consumer_count(&self, queue: &str) -> Option<usize> {
        self.state.lock().queues.get(queue).map(|q| q.consumers.len())
    }

    /// Total messages published through any channel.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.state.lock().published
    }

    /// Messages dropped because their queue did not exist.
    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}

/// A channel on an [`InMemoryBroker`].
pub struct InMemoryChannel {
    id: u64,
    broker: Shared,
    closed: AtomicBool,
}

impl InMemoryChannel {
    /// Channel identifier, unique per broker.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check whether the channel has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.is_closed() {
            Err(BrokerError::ChannelClosed)
        } else {
            Ok(())
        }
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let weak = Arc::downgrade(&self.broker);
        let mut state = self.broker.lock();
        close_channel(&mut state, self.id, &weak);
        debug!(channel = self.id, "Closed in-memory channel");
    }
}

#[async_trait]
impl BrokerLink for InMemoryChannel {
    async fn declare_queue(&self, name: &str, options: QueueOptions) -> Result<String, BrokerError> {
        self.ensure_open()?;
        let mut state = self.broker.lock();

        let name = if name.is_empty() {
            format!("amq.gen-{}", Uuid::new_v4().simple())
        } else {
            name.to_string()
        };

        if let Some(existing) = state.queues.get(&name) {
            if existing.locked_for(self.id) {
                return Err(BrokerError::QueueLocked(name));
            }
            return Ok(name);
        }

        state
            .queues
            .insert(name.clone(), QueueState::new(options, self.id));
        debug!(queue = %name, channel = self.id, exclusive = options.exclusive, "Declared queue");
        Ok(name)
    }

    async fn publish(&self, queue: &str, message: Message) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let weak = Arc::downgrade(&self.broker);
        let mut guard = self.broker.lock();
        let state = &mut *guard;
        state.published += 1;

        match state.queues.get_mut(queue) {
            Some(target) => {
                target.ready.push_back(Queued {
                    message,
                    redelivered: false,
                });
                dispatch(queue, target, &mut state.next_tag, &weak);
            }
            None => {
                state.dropped += 1;
                warn!(queue = queue, "Message dropped (no such queue)");
            }
        }
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        options: ConsumeOptions,
    ) -> Result<DeliveryStream, BrokerError> {
        self.ensure_open()?;
        let weak = Arc::downgrade(&self.broker);
        let mut guard = self.broker.lock();
        let state = &mut *guard;

        state.next_consumer += 1;
        let consumer_id = state.next_consumer;

        let target = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;
        if target.locked_for(self.id) {
            return Err(BrokerError::QueueLocked(queue.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        target.consumers.push(Consumer {
            id: consumer_id,
            channel: self.id,
            tx,
            options,
            unacked: HashMap::new(),
        });
        debug!(
            queue = queue,
            consumer = consumer_id,
            prefetch = options.prefetch,
            auto_ack = options.auto_ack,
            "Consumer registered"
        );
        dispatch(queue, target, &mut state.next_tag, &weak);

        Ok(Box::pin(MemoryConsumer {
            rx,
            broker: weak,
            queue: queue.to_string(),
            consumer: consumer_id,
        }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.shutdown();
        Ok(())
    }
}

impl Drop for InMemoryChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}
