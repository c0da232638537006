//! Outbound Ports (Driven Ports)
//!
//! The upstream market data the pricing service depends on.

use async_trait::async_trait;
use bytes::Bytes;
use shared_rpc::FetchError;

/// Source of the latest coin listings, ordered by market cap.
#[async_trait]
pub trait ListingsSource: Send + Sync {
    /// Raw `listings/latest` response body for the top `limit` coins.
    async fn latest_listings(&self, limit: usize) -> Result<Bytes, FetchError>;
}
