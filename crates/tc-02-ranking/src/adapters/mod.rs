//! Adapters connecting the ranking service to external systems.

pub mod cryptocompare;

pub use cryptocompare::CryptoCompareClient;
