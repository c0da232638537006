//! Pending Call Store - bridges asynchronous replies back to waiting callers.
//!
//! Maps correlation tokens to the callers awaiting a reply on one reply queue.
//!
//! Flow:
//! 1. Client mints a token and calls `register()` to get a oneshot receiver
//! 2. Client publishes the request carrying the token
//! 3. Reply listener receives a reply and calls `complete()`
//! 4. Client awaits the receiver or times out
//!
//! Once `fail_all()` has run the store is closed: every waiting caller has
//! been failed and further registrations are refused.

use crate::correlation::CorrelationId;
use crate::error::RpcError;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

/// What a waiting caller receives.
pub type CallResult = Result<Bytes, RpcError>;

/// A call waiting for its reply.
struct PendingCall {
    /// Channel to hand the reply to the caller
    sender: oneshot::Sender<CallResult>,
    /// When the call was registered
    created_at: Instant,
    /// Request queue (for logging)
    queue: String,
}

/// Counters for the pending call store.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Calls registered
    pub total_registered: AtomicU64,
    /// Calls resolved by a matching reply
    pub total_completed: AtomicU64,
    /// Calls that timed out
    pub total_timeouts: AtomicU64,
    /// Calls abandoned before a reply (publish failure, caller dropped)
    pub total_cancelled: AtomicU64,
    /// Calls failed because the reply stream went away
    pub total_failed: AtomicU64,
    /// Replies that matched no pending call
    pub total_unmatched: AtomicU64,
}

/// Point-in-time copy of [`PendingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub cancelled: u64,
    pub failed: u64,
    pub unmatched: u64,
}

impl PendingStats {
    pub fn snapshot(&self) -> PendingSnapshot {
        PendingSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            completed: self.total_completed.load(Ordering::Relaxed),
            timeouts: self.total_timeouts.load(Ordering::Relaxed),
            cancelled: self.total_cancelled.load(Ordering::Relaxed),
            failed: self.total_failed.load(Ordering::Relaxed),
            unmatched: self.total_unmatched.load(Ordering::Relaxed),
        }
    }
}

/// Pending call store for one reply queue.
#[derive(Default)]
pub struct PendingCallStore {
    pending: DashMap<CorrelationId, PendingCall>,
    stats: PendingStats,
    /// Set once by `fail_all`; the error handed to late registrations
    closed: Mutex<Option<RpcError>>,
}

impl PendingCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call and get a receiver for its reply.
    ///
    /// Fails with [`RpcError::CorrelationInUse`] if the token is already
    /// pending, or with the closing error once the store is closed.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        queue: &str,
    ) -> Result<oneshot::Receiver<CallResult>, RpcError> {
        if let Some(err) = self.closed.lock().clone() {
            return Err(err);
        }

        let (tx, rx) = oneshot::channel();
        match self.pending.entry(correlation_id.clone()) {
            Entry::Occupied(_) => return Err(RpcError::CorrelationInUse(correlation_id)),
            Entry::Vacant(slot) => {
                slot.insert(PendingCall {
                    sender: tx,
                    created_at: Instant::now(),
                    queue: queue.to_string(),
                });
            }
        }

        // fail_all may have drained the map between the check above and the insert
        if let Some(err) = self.closed.lock().clone() {
            self.pending.remove(&correlation_id);
            return Err(err);
        }

        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %correlation_id,
            queue = queue,
            "Registered pending call"
        );
        Ok(rx)
    }

    /// Resolve a pending call with its reply body.
    ///
    /// Returns false if no call is waiting for this token; the reply is then
    /// counted as unmatched and nothing else changes.
    pub fn complete(&self, correlation_id: &CorrelationId, body: Bytes) -> bool {
        let Some((_, call)) = self.pending.remove(correlation_id) else {
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %correlation_id,
                "Reply for unknown or expired correlation id"
            );
            return false;
        };

        let response_time = call.created_at.elapsed();
        if call.sender.send(Ok(body)).is_ok() {
            self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %correlation_id,
                queue = call.queue,
                response_time_ms = response_time.as_millis(),
                "Completed pending call"
            );
        } else {
            // Caller went away between the reply arriving and us handing it over
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %correlation_id,
                queue = call.queue,
                "Pending call receiver dropped"
            );
        }
        true
    }

    /// Release a call that will never be answered (publish failed, caller gone).
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Release a call whose timeout elapsed.
    pub fn expire(&self, correlation_id: &CorrelationId, timeout: Duration) -> bool {
        let Some((_, call)) = self.pending.remove(correlation_id) else {
            return false;
        };
        self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %correlation_id,
            queue = call.queue,
            timeout_ms = timeout.as_millis(),
            "Pending call timed out"
        );
        true
    }

    /// Fail every pending call with `error` and refuse new registrations.
    ///
    /// Returns the number of calls failed.
    pub fn fail_all(&self, error: RpcError) -> usize {
        {
            let mut closed = self.closed.lock();
            if closed.is_none() {
                *closed = Some(error.clone());
            }
        }

        let ids: Vec<CorrelationId> = self.pending.iter().map(|e| e.key().clone()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, call)) = self.pending.remove(&id) {
                let _ = call.sender.send(Err(error.clone()));
                failed += 1;
            }
        }
        self.stats
            .total_failed
            .fetch_add(failed as u64, Ordering::Relaxed);
        failed
    }

    /// Count a reply that could not even be decoded as unmatched.
    pub fn record_unmatched(&self) {
        self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of calls currently waiting.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a token is pending.
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    /// Check whether `fail_all` has run.
    pub fn is_closed(&self) -> bool {
        self.closed.lock().is_some()
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

/// Releases a call's pending entry when the calling future goes away.
///
/// A no-op if the call was already completed, expired or cancelled.
pub struct PendingGuard {
    store: Arc<PendingCallStore>,
    correlation_id: CorrelationId,
}

impl PendingGuard {
    pub fn new(store: Arc<PendingCallStore>, correlation_id: CorrelationId) -> Self {
        Self {
            store,
            correlation_id,
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.store.cancel(&self.correlation_id);
    }
}
