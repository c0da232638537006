//! Outbound port: the RPC client the gateway calls workers through.

use async_trait::async_trait;
use bytes::Bytes;
use shared_rpc::{RpcClient, RpcError};

/// Issues request/reply calls to work queues.
#[async_trait]
pub trait RpcCaller: Send + Sync {
    /// Call `queue` with `body`, bounded by the caller's timeout.
    async fn call(&self, queue: &str, body: Bytes) -> Result<Bytes, RpcError>;

    /// Check whether the caller can no longer make calls.
    fn is_closed(&self) -> bool;

    /// Calls currently waiting for a reply.
    fn pending_count(&self) -> usize;
}

#[async_trait]
impl RpcCaller for RpcClient {
    async fn call(&self, queue: &str, body: Bytes) -> Result<Bytes, RpcError> {
        RpcClient::call(self, queue, body).await
    }

    fn is_closed(&self) -> bool {
        RpcClient::is_closed(self)
    }

    fn pending_count(&self) -> usize {
        RpcClient::pending_count(self)
    }
}
