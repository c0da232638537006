//! RPC Client - synchronous-looking calls over an asynchronous broker.
//!
//! Each client owns one exclusive, broker-named reply queue, consumed with
//! auto-acknowledgement by a background [`ReplyListener`]. Concurrent calls
//! share that queue; the listener routes each reply to the call whose
//! correlation token it carries and discards everything else.

use crate::config::ClientConfig;
use crate::correlation::TokenGenerator;
use crate::envelope::{ReplyEnvelope, RequestEnvelope};
use crate::error::RpcError;
use crate::pending::{PendingCallStore, PendingGuard, PendingSnapshot};
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use shared_broker::{BrokerError, BrokerLink, ConsumeOptions, DeliveryStream, Message, QueueOptions};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a reply listener stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerExit {
    /// The client was shut down.
    Cancelled,
    /// The broker ended the reply stream (consumer cancelled, channel closed).
    StreamClosed,
    /// The reply stream yielded an error.
    StreamFailed(BrokerError),
}

/// Client for request/reply calls to worker queues.
pub struct RpcClient {
    link: Arc<dyn BrokerLink>,
    config: ClientConfig,
    reply_queue: String,
    tokens: TokenGenerator,
    pending: Arc<PendingCallStore>,
    shutdown: CancellationToken,
    listener: Mutex<Option<JoinHandle<ListenerExit>>>,
}

impl RpcClient {
    /// Declare the reply queue, start consuming it and spawn the reply listener.
    pub async fn connect(link: Arc<dyn BrokerLink>, config: ClientConfig) -> Result<Self, RpcError> {
        config.validate()?;
        let reply_queue = link.declare_queue("", QueueOptions::reply_queue()).await?;
        let deliveries = link.consume(&reply_queue, ConsumeOptions::auto_ack()).await?;

        let pending = Arc::new(PendingCallStore::new());
        let shutdown = CancellationToken::new();
        let listener = ReplyListener::new(
            Arc::clone(&pending),
            deliveries,
            shutdown.clone(),
            reply_queue.clone(),
        );
        let handle = tokio::spawn(listener.run());

        info!(reply_queue = %reply_queue, "RPC client connected");

        Ok(Self {
            tokens: TokenGenerator::new(config.token_strategy, reply_queue.clone()),
            link,
            config,
            reply_queue,
            pending,
            shutdown,
            listener: Mutex::new(Some(handle)),
        })
    }

    /// Call `queue` with `payload`, bounded by the configured call timeout.
    pub async fn call(&self, queue: &str, payload: impl Into<Bytes>) -> Result<Bytes, RpcError> {
        self.call_with_timeout(queue, payload, self.config.call_timeout)
            .await
    }

    /// Call `queue` with `payload`, bounded by `timeout`.
    ///
    /// Returns the body of the reply carrying this call's token, or a
    /// classified error. Never returns another call's reply.
    pub async fn call_with_timeout(
        &self,
        queue: &str,
        payload: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<Bytes, RpcError> {
        let started = Instant::now();
        let result = self.round_trip(queue, payload.into(), timeout).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        topcoins_telemetry::record_rpc_call(queue, outcome, started.elapsed());
        result
    }

    async fn round_trip(
        &self,
        queue: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, RpcError> {
        if self.shutdown.is_cancelled() {
            return Err(RpcError::Closed);
        }

        // One bound covers both the publish and the wait for the reply
        let deadline = tokio::time::Instant::now() + timeout;
        let correlation_id = self.tokens.next_id();
        let rx = self.pending.register(correlation_id.clone(), queue)?;
        // Released on every exit path, including the caller dropping this future
        let _guard = PendingGuard::new(Arc::clone(&self.pending), correlation_id.clone());

        let request = RequestEnvelope::new(correlation_id.clone(), self.reply_queue.as_str(), payload);
        let publish = self.link.publish(queue, request.into_message());
        match tokio::time::timeout_at(deadline, publish).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.pending.cancel(&correlation_id);
                warn!(
                    correlation_id = %correlation_id,
                    queue = queue,
                    error = %e,
                    "Failed to publish RPC request"
                );
                return Err(e.into());
            }
            Err(_) => {
                self.pending.expire(&correlation_id, timeout);
                warn!(
                    correlation_id = %correlation_id,
                    queue = queue,
                    timeout_ms = timeout.as_millis(),
                    "RPC request publish timed out"
                );
                return Err(RpcError::Timeout {
                    queue: queue.to_string(),
                    timeout,
                });
            }
        }

        debug!(
            correlation_id = %correlation_id,
            queue = queue,
            reply_to = %self.reply_queue,
            "Sent RPC request"
        );

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::Transport("reply channel dropped".into())),
            Err(_) => {
                self.pending.expire(&correlation_id, timeout);
                warn!(
                    correlation_id = %correlation_id,
                    queue = queue,
                    timeout_ms = timeout.as_millis(),
                    "RPC call timed out"
                );
                Err(RpcError::Timeout {
                    queue: queue.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Name of this client's reply queue.
    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    /// Calls currently waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    pub fn stats(&self) -> PendingSnapshot {
        self.pending.stats().snapshot()
    }

    /// Check whether the client can no longer make calls.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.pending.is_closed()
    }

    /// Stop the reply listener and fail any calls still waiting with
    /// [`RpcError::Closed`].
    pub async fn shutdown(&self) -> Option<ListenerExit> {
        self.shutdown.cancel();
        let handle = self.listener.lock().take();
        let exit = match handle {
            Some(handle) => handle.await.ok(),
            None => None,
        };
        info!(reply_queue = %self.reply_queue, exit = ?exit, "RPC client shut down");
        exit
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Routes deliveries on a reply queue to pending calls.
pub struct ReplyListener {
    pending: Arc<PendingCallStore>,
    deliveries: DeliveryStream,
    shutdown: CancellationToken,
    reply_queue: String,
}

impl ReplyListener {
    pub fn new(
        pending: Arc<PendingCallStore>,
        deliveries: DeliveryStream,
        shutdown: CancellationToken,
        reply_queue: String,
    ) -> Self {
        Self {
            pending,
            deliveries,
            shutdown,
            reply_queue,
        }
    }

    /// Run the listener loop until cancelled or the reply stream ends.
    ///
    /// Whatever the reason, calls still pending when the loop exits are
    /// failed immediately rather than left to time out.
    pub async fn run(mut self) -> ListenerExit {
        let exit = loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break ListenerExit::Cancelled,
                next = self.deliveries.next() => match next {
                    Some(Ok(delivery)) => self.route(&delivery.message),
                    Some(Err(e)) => break ListenerExit::StreamFailed(e),
                    None => break ListenerExit::StreamClosed,
                },
            }
        };

        let error = match &exit {
            ListenerExit::Cancelled => RpcError::Closed,
            ListenerExit::StreamClosed => RpcError::Transport("reply stream closed".into()),
            ListenerExit::StreamFailed(e) => RpcError::Transport(format!("reply stream failed: {e}")),
        };
        let failed = self.pending.fail_all(error);

        match &exit {
            ListenerExit::Cancelled => {
                debug!(reply_queue = %self.reply_queue, failed, "Reply listener stopped");
            }
            _ => {
                warn!(
                    reply_queue = %self.reply_queue,
                    exit = ?exit,
                    failed,
                    "Reply listener lost its stream"
                );
            }
        }
        exit
    }

    fn route(&self, message: &Message) {
        match ReplyEnvelope::from_message(message) {
            Ok(reply) => {
                if !self.pending.complete(&reply.correlation_id, reply.body) {
                    topcoins_telemetry::record_unmatched_reply();
                    debug!(
                        error = %RpcError::CorrelationMismatch(reply.correlation_id),
                        reply_queue = %self.reply_queue,
                        "Discarded reply"
                    );
                }
            }
            Err(e) => {
                self.pending.record_unmatched();
                topcoins_telemetry::record_unmatched_reply();
                debug!(error = %e, reply_queue = %self.reply_queue, "Discarded undecodable reply");
            }
        }
    }
}
