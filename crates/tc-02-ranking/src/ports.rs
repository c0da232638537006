//! Outbound Ports (Driven Ports)

use async_trait::async_trait;
use bytes::Bytes;
use shared_rpc::FetchError;

/// Paged source of coins ordered by market cap.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Raw body of page `page` (zero-based) holding up to `page_size` coins.
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Bytes, FetchError>;
}
