//! Pricing service: the worker's fetch capability.

use crate::domain::{encode_prices, parse_listings};
use crate::ports::ListingsSource;
use async_trait::async_trait;
use bytes::Bytes;
use shared_rpc::{FetchData, FetchError, FetchParams};
use tracing::debug;

/// Fetches the top coins' USD prices and encodes them as a reply body.
pub struct PricingService<S> {
    source: S,
}

impl<S: ListingsSource> PricingService<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<S: ListingsSource> FetchData for PricingService<S> {
    async fn fetch(&self, params: FetchParams) -> Result<Bytes, FetchError> {
        let raw = self.source.latest_listings(params.count).await?;
        let coins = parse_listings(&raw)?;
        debug!(requested = params.count, received = coins.len(), "Fetched listings");
        encode_prices(&coins)
    }
}
