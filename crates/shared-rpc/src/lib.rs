//! # Shared RPC - Request/Reply over a Message Broker
//!
//! A synchronous-looking call convention layered on the asynchronous
//! publish/consume transport of [`shared_broker`].
//!
//! ## Call Flow
//!
//! ```text
//! RpcClient::call(queue, body)
//!       │ register token ──→ PendingCallStore
//!       │ publish {token, reply_to, text/plain, body}
//!       ▼
//! ┌──────────────┐   work queue    ┌──────────────┐
//! │    Broker    │ ──────────────→ │  RpcWorker   │ ──→ FetchData::fetch
//! │              │ ←────────────── │              │
//! └──────────────┘  reply queue    └──────────────┘
//!       │ {token, body}
//!       ▼
//! ReplyListener ──→ PendingCallStore::complete(token) ──→ caller resumes
//! ```
//!
//! ## Guarantees
//!
//! - A call returns the reply carrying its own token, or a typed error
//! - Replies for unknown tokens are counted and dropped; pending calls are untouched
//! - Every call is bounded by a timeout and releases its pending state on exit
//! - A worker settles each delivery exactly once

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod config;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod fetch;
pub mod payload;
pub mod pending;
pub mod worker;

pub use client::{ListenerExit, ReplyListener, RpcClient};
pub use config::{ClientConfig, ConfigError, WorkerConfig};
pub use correlation::{CorrelationId, TokenGenerator, TokenStrategy};
pub use envelope::{ReplyEnvelope, RequestEnvelope};
pub use error::RpcError;
pub use fetch::{FetchData, FetchError};
pub use payload::FetchParams;
pub use pending::{PendingCallStore, PendingGuard, PendingSnapshot};
pub use worker::{DeliveryOutcome, RpcWorker, WorkerExit, WorkerSnapshot, WorkerState};

/// Work queue served by pricing workers.
pub const PRICING_QUEUE: &str = "pricing_queue";

/// Work queue served by ranking workers.
pub const RANKING_QUEUE: &str = "ranking_queue";
