//! # TC-02 Ranking
//!
//! Ranking worker: answers requests on `ranking_queue` with the symbols of
//! the top coins by market cap, fetched page by page from CryptoCompare.
//!
//! ## Architecture
//!
//! - **Domain** (`domain`): page parsing, reply encoding
//! - **Ports** (`ports`): `PageSource`, the upstream dependency
//! - **Service** (`service`): `RankingService`, paging plus the worker's `FetchData`
//! - **Adapters** (`adapters`): `CryptoCompareClient` over `reqwest`
//!
//! ## Request / Reply
//!
//! Request body: decimal count (empty means 200). A count of 200 is served
//! as pages 0 and 1 of 100 coins each. Reply body: `["BTC", "ETH", ...]`.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::CryptoCompareClient;
pub use config::{RankingConfigError, UpstreamConfig};
pub use ports::PageSource;
pub use service::{RankingService, MAX_PAGE_SIZE};

/// Count served when a request body is empty.
pub const DEFAULT_COUNT: usize = 200;
