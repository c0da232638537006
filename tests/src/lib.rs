//! # Top-Coins Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs        # In-process broker, fake upstreams, worker spawning
//!     ├── rpc_flows.rs      # RpcClient ⇄ RpcWorker over the broker
//!     └── gateway_flows.rs  # HTTP → gateway → workers → HTTP
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p tc-tests
//! cargo test -p tc-tests integration::gateway_flows::
//!
//! # Benchmarks
//! cargo bench -p tc-tests
//! ```

#![allow(dead_code)]

pub mod integration;
