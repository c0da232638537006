//! # TC-01 Pricing
//!
//! Pricing worker: answers requests on `pricing_queue` with the USD prices
//! of the top coins by market cap, fetched from CoinMarketCap.
//!
//! ## Architecture
//!
//! - **Domain** (`domain`): listing records, response parsing, reply encoding
//! - **Ports** (`ports`): `ListingsSource`, the upstream dependency
//! - **Service** (`service`): `PricingService`, the worker's `FetchData`
//! - **Adapters** (`adapters`): `CoinMarketCapClient` over `reqwest`
//!
//! ## Request / Reply
//!
//! Request body: decimal count (empty means 100). Reply body:
//!
//! ```json
//! [{"symbol": "BTC", "quote": {"USD": {"price": 11923.37}}}, ...]
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::CoinMarketCapClient;
pub use config::{PricingConfigError, UpstreamConfig};
pub use domain::{Cryptocurrency, Quote};
pub use ports::ListingsSource;
pub use service::PricingService;

/// Count served when a request body is empty.
pub const DEFAULT_COUNT: usize = 100;
