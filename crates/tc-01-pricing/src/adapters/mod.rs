//! Adapters connecting the pricing service to external systems.

pub mod coinmarketcap;

pub use coinmarketcap::CoinMarketCapClient;
