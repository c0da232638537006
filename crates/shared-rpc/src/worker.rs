//! # RPC Worker
//!
//! Consumes requests from a well-known work queue, hands each one to an
//! injected [`FetchData`] capability and publishes the result to the
//! requester's reply queue.
//!
//! ## Request Flow
//!
//! ```text
//! work queue ──→ decode envelope + count ──→ FetchData::fetch
//!                        │                         │
//!                   reject (bad)          ok ──→ publish reply ──→ ack
//!                                         err ─→ requeue once, then reject
//! ```
//!
//! ## Settlement Policy
//!
//! - Undecodable request (body, missing reply-to or token): rejected without
//!   requeue, never redelivered forever
//! - Fetch failure on a first delivery: requeued for one more attempt
//! - Fetch failure on a redelivery: rejected without requeue
//! - Reply publish failure: requeued best effort, then the worker stops
//!
//! With the default prefetch of 1 a worker holds one request at a time and
//! moves `Idle → Processing → Idle` until it stops.

use crate::config::WorkerConfig;
use crate::envelope::{ReplyEnvelope, RequestEnvelope};
use crate::error::RpcError;
use crate::fetch::FetchData;
use crate::payload::FetchParams;
use futures::StreamExt;
use shared_broker::{BrokerLink, ConsumeOptions, Delivery, QueueOptions};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Observable worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for the next request.
    Idle,
    /// Handling a request.
    Processing,
    /// The consume loop has ended.
    Stopped,
}

/// Why a worker's consume loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The shutdown token was cancelled.
    Cancelled,
    /// The broker ended the delivery stream.
    StreamClosed,
    /// Declaring, consuming, replying or settling failed.
    Failed(RpcError),
}

/// How one delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Reply published, request acknowledged.
    Replied,
    /// Request negatively acknowledged without requeue.
    Rejected,
    /// Request returned to the queue for another attempt.
    Requeued,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Replied => "replied",
            DeliveryOutcome::Rejected => "rejected",
            DeliveryOutcome::Requeued => "requeued",
        }
    }
}

/// Worker counters.
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub total_replied: AtomicU64,
    pub total_rejected: AtomicU64,
    pub total_requeued: AtomicU64,
    pub total_failed: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub replied: u64,
    pub rejected: u64,
    pub requeued: u64,
    pub failed: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            replied: self.total_replied.load(Ordering::Relaxed),
            rejected: self.total_rejected.load(Ordering::Relaxed),
            requeued: self.total_requeued.load(Ordering::Relaxed),
            failed: self.total_failed.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: DeliveryOutcome) {
        let counter = match outcome {
            DeliveryOutcome::Replied => &self.total_replied,
            DeliveryOutcome::Rejected => &self.total_rejected,
            DeliveryOutcome::Requeued => &self.total_requeued,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Serves requests from one work queue over its own broker channel.
pub struct RpcWorker {
    link: Arc<dyn BrokerLink>,
    config: WorkerConfig,
    capability: Arc<dyn FetchData>,
    state: watch::Sender<WorkerState>,
    stats: WorkerStats,
}

impl RpcWorker {
    pub fn new(
        link: Arc<dyn BrokerLink>,
        config: WorkerConfig,
        capability: Arc<dyn FetchData>,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            link,
            config,
            capability,
            state,
            stats: WorkerStats::default(),
        }
    }

    /// Work queue this worker consumes.
    pub fn queue(&self) -> &str {
        &self.config.queue
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> WorkerSnapshot {
        self.stats.snapshot()
    }

    /// Declare the work queue and serve requests until `shutdown` is
    /// cancelled, the delivery stream ends, or a transport error occurs.
    ///
    /// A request being processed when `shutdown` fires is finished first.
    #[instrument(skip(self, shutdown), fields(queue = %self.config.queue))]
    pub async fn run(&self, shutdown: CancellationToken) -> WorkerExit {
        let exit = self.consume(shutdown).await;
        self.state.send_replace(WorkerState::Stopped);

        match &exit {
            WorkerExit::Failed(e) => error!(error = %e, "Worker stopped"),
            other => info!(exit = ?other, "Worker stopped"),
        }
        exit
    }

    async fn consume(&self, shutdown: CancellationToken) -> WorkerExit {
        let queue = self.config.queue.as_str();
        if let Err(e) = self.link.declare_queue(queue, QueueOptions::work_queue()).await {
            return WorkerExit::Failed(e.into());
        }
        let mut deliveries = match self
            .link
            .consume(queue, ConsumeOptions::manual_ack(self.config.prefetch))
            .await
        {
            Ok(stream) => stream,
            Err(e) => return WorkerExit::Failed(e.into()),
        };
        info!(prefetch = self.config.prefetch, "Awaiting RPC requests");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return WorkerExit::Cancelled,
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => {
                        if let Err(e) = self.handle_delivery(delivery).await {
                            return WorkerExit::Failed(e);
                        }
                    }
                    Some(Err(e)) => return WorkerExit::Failed(e.into()),
                    None => return WorkerExit::StreamClosed,
                },
            }
        }
    }

    /// Process and settle one delivery.
    ///
    /// Every delivery is settled exactly once. An `Err` means the broker
    /// could not be reached to reply or settle; the worker should stop.
    pub async fn handle_delivery(&self, delivery: Delivery) -> Result<DeliveryOutcome, RpcError> {
        self.state.send_replace(WorkerState::Processing);
        let result = self.process(&delivery).await;
        self.state.send_replace(WorkerState::Idle);

        match &result {
            Ok(outcome) => {
                self.stats.record(*outcome);
                topcoins_telemetry::record_worker_delivery(&self.config.queue, outcome.as_str());
            }
            Err(_) => {
                self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
                topcoins_telemetry::record_worker_delivery(&self.config.queue, "failed");
            }
        }
        result
    }

    async fn process(&self, delivery: &Delivery) -> Result<DeliveryOutcome, RpcError> {
        let decoded = RequestEnvelope::from_message(&delivery.message).and_then(|request| {
            let params =
                FetchParams::decode(&request.body, self.config.default_count, self.config.max_count)?;
            Ok((request, params))
        });
        let (request, params) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(
                    correlation_id = delivery.message.correlation_id().unwrap_or(""),
                    error = %e,
                    "Rejecting malformed request"
                );
                delivery.reject().await?;
                return Ok(DeliveryOutcome::Rejected);
            }
        };

        debug!(
            correlation_id = %request.correlation_id,
            count = params.count,
            redelivered = delivery.redelivered,
            "Processing request"
        );

        let body = match self.capability.fetch(params).await {
            Ok(body) => body,
            Err(e) if delivery.redelivered => {
                warn!(
                    correlation_id = %request.correlation_id,
                    error = %e,
                    "Fetch failed again, rejecting request"
                );
                delivery.reject().await?;
                return Ok(DeliveryOutcome::Rejected);
            }
            Err(e) => {
                warn!(
                    correlation_id = %request.correlation_id,
                    error = %e,
                    "Fetch failed, requeueing request"
                );
                delivery.requeue().await?;
                return Ok(DeliveryOutcome::Requeued);
            }
        };

        let reply = ReplyEnvelope::new(request.correlation_id.clone(), body);
        if let Err(e) = self.link.publish(&request.reply_to, reply.into_message()).await {
            error!(
                correlation_id = %request.correlation_id,
                reply_to = %request.reply_to,
                error = %e,
                "Failed to publish reply"
            );
            if let Err(nack) = delivery.requeue().await {
                debug!(error = %nack, "Requeue after failed reply also failed");
            }
            return Err(e.into());
        }

        delivery.ack().await?;
        debug!(
            correlation_id = %request.correlation_id,
            reply_to = %request.reply_to,
            "Replied to request"
        );
        Ok(DeliveryOutcome::Replied)
    }
}
