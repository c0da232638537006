//! # TC-03 Gateway
//!
//! HTTP front door. Each `GET /` issues one pricing call and one ranking call
//! through a shared [`shared_rpc::RpcClient`], runs them concurrently, and
//! answers with the two JSON payloads concatenated byte for byte.
//!
//! ## Architecture
//!
//! - **Ports** (`ports`): `RpcCaller`, implemented by `RpcClient`
//! - **Service** (`service`): `Gateway`, the concurrent fan-out
//! - **Router** (`router`): `axum` routes for `/`, `/health`, `/metrics`
//!
//! ## Degradation
//!
//! | Pricing | Ranking | Response |
//! |---------|---------|----------|
//! | ok | ok | 200, both payloads |
//! | ok | failed | 200, pricing only, `x-topcoins-partial: ranking` |
//! | failed | ok | 200, ranking only, `x-topcoins-partial: pricing` |
//! | timeout | timeout | 504 |
//! | failed | failed | 502 |

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod ports;
pub mod router;
pub mod service;

pub use config::{GatewayConfig, GatewayConfigError};
pub use ports::RpcCaller;
pub use router::{router, PARTIAL_HEADER};
pub use service::{Gateway, TopCoins};
