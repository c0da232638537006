//! Cross-crate flows over the in-process broker.

pub mod harness;

mod gateway_flows;
mod rpc_flows;
