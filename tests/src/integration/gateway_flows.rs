//! # Gateway Flows
//!
//! HTTP request → `Gateway` → `RpcClient` → broker → pricing and ranking
//! workers → merged HTTP response.

#[cfg(test)]
mod tests {
    use crate::integration::harness::TestBroker;
    use axum::body::{to_bytes, Body};
    use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
    use axum::response::Response;
    use shared_rpc::ClientConfig;
    use std::sync::Arc;
    use tc_03_gateway::{router, Gateway, GatewayConfig, PARTIAL_HEADER};
    use tower::ServiceExt;

    async fn get(gateway: Arc<Gateway>, uri: &str) -> Response {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        router(gateway).oneshot(request).await.unwrap()
    }

    /// Split a body made of concatenated JSON documents.
    fn documents(body: &[u8]) -> Vec<serde_json::Value> {
        serde_json::Deserializer::from_slice(body)
            .into_iter::<serde_json::Value>()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    async fn body_of(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn test_root_merges_pricing_and_ranking() {
        let broker = TestBroker::new();
        let (_pricing, _) = broker.spawn_pricing().await;
        let (_ranking, pages) = broker.spawn_ranking(500).await;
        let client = broker.client(ClientConfig::default()).await;
        let gateway = Arc::new(Gateway::new(client.clone(), GatewayConfig::default()));

        let response = get(gateway, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert!(response.headers().get(PARTIAL_HEADER).is_none());

        let docs = documents(&body_of(response).await);
        assert_eq!(docs.len(), 2);

        let prices = docs[0].as_array().unwrap();
        assert_eq!(prices.len(), 100);
        assert_eq!(prices[99]["symbol"], "P99");

        let ranked = docs[1].as_array().unwrap();
        assert_eq!(ranked.len(), 100);
        assert_eq!(ranked[0], "R0");

        // Per-call limit of 100 is a single upstream page
        assert_eq!(*pages.lock(), [0]);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_root_degrades_without_ranking_worker() {
        let broker = TestBroker::new();
        let (_pricing, _) = broker.spawn_pricing().await;
        let client = broker.client(ClientConfig::default()).await;
        let gateway = Arc::new(Gateway::new(client.clone(), GatewayConfig::default()));

        let response = get(gateway, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[PARTIAL_HEADER], "ranking");

        let docs = documents(&body_of(response).await);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].as_array().unwrap().len(), 100);
        assert_eq!(client.stats().timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_root_times_out_with_no_workers() {
        let broker = TestBroker::new();
        let client = broker.client(ClientConfig::default()).await;
        let gateway = Arc::new(Gateway::new(client.clone(), GatewayConfig::default()));

        let response = get(gateway, "/").await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_health_follows_client_lifecycle() {
        let broker = TestBroker::new();
        let client = broker.client(ClientConfig::default()).await;
        let gateway = Arc::new(Gateway::new(client.clone(), GatewayConfig::default()));

        assert_eq!(get(gateway.clone(), "/health").await.status(), StatusCode::OK);

        client.shutdown().await;
        let response = get(gateway, "/health").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json: serde_json::Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(json["status"], "closed");
    }
}
