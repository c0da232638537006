//! # RPC Flows
//!
//! `RpcClient` and real `RpcWorker`s (pricing and ranking services over fake
//! upstreams) talking through the in-process broker.
//!
//! ## Flows Tested
//!
//! 1. Ranking request for 200 symbols is served as two upstream pages
//! 2. Concurrent calls on one reply queue each resolve to their own reply
//! 3. Calls with no live worker time out; the stale reply is discarded later
//! 4. Malformed requests are rejected, never redelivered
//! 5. A request held by a crashed worker is redelivered to another one

#[cfg(test)]
mod tests {
    use crate::integration::harness::{StallingFetch, TestBroker};
    use futures::future::join_all;
    use shared_broker::{BrokerLink, QueueOptions};
    use shared_rpc::{ClientConfig, RpcError, TokenStrategy, PRICING_QUEUE, RANKING_QUEUE};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    fn symbols(body: &[u8]) -> Vec<String> {
        serde_json::from_slice(body).unwrap()
    }

    async fn declare(broker: &TestBroker, queue: &str) {
        broker
            .broker
            .channel()
            .declare_queue(queue, QueueOptions::work_queue())
            .await
            .unwrap();
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_ranking_200_is_two_pages_of_100() {
        let broker = TestBroker::new();
        let (_worker, pages) = broker.spawn_ranking(500).await;
        let client = broker.client(ClientConfig::default()).await;

        let body = client.call(RANKING_QUEUE, "200").await.unwrap();
        let symbols = symbols(&body);

        assert_eq!(symbols.len(), 200);
        assert_eq!(symbols[0], "R0");
        assert_eq!(symbols[199], "R199");
        assert_eq!(*pages.lock(), [0, 1]);
    }

    #[tokio::test]
    async fn test_empty_body_uses_worker_default() {
        let broker = TestBroker::new();
        let (_pricing, _) = broker.spawn_pricing().await;
        let (_ranking, _) = broker.spawn_ranking(1000).await;
        let client = broker.client(ClientConfig::default()).await;

        let prices: Vec<serde_json::Value> =
            serde_json::from_slice(&client.call(PRICING_QUEUE, "").await.unwrap()).unwrap();
        assert_eq!(prices.len(), 100);
        assert_eq!(prices[0]["symbol"], "P0");
        assert_eq!(prices[0]["quote"]["USD"]["price"], 0.5);

        let ranked = symbols(&client.call(RANKING_QUEUE, "").await.unwrap());
        assert_eq!(ranked.len(), 200);
    }

    #[tokio::test]
    async fn test_concurrent_calls_resolve_to_their_own_replies() {
        let broker = TestBroker::new();
        let (first, calls) = broker.spawn_pricing().await;
        let (second, _) = broker.spawn_pricing().await;
        let client = broker.client(ClientConfig::default()).await;

        let results = join_all((1..=20usize).map(|count| {
            let client = Arc::clone(&client);
            async move { (count, client.call(PRICING_QUEUE, count.to_string()).await) }
        }))
        .await;

        for (count, result) in results {
            let prices: Vec<serde_json::Value> = serde_json::from_slice(&result.unwrap()).unwrap();
            assert_eq!(prices.len(), count, "call for {count} got another call's reply");
        }

        let replied = first.worker.stats().replied + second.worker.stats().replied;
        assert_eq!(replied, 20);
        assert!(calls.load(Ordering::Relaxed) <= 20);
        assert_eq!(client.pending_count(), 0);
        assert_eq!(client.stats().completed, 20);
        assert_eq!(client.stats().unmatched, 0);
        assert_eq!(broker.broker.unacked_count(PRICING_QUEUE), Some(0));
    }

    #[tokio::test]
    async fn test_sequential_tokens_round_trip() {
        let broker = TestBroker::new();
        let (_worker, _) = broker.spawn_ranking(50).await;
        let client = broker
            .client(ClientConfig {
                token_strategy: TokenStrategy::Sequential,
                ..ClientConfig::default()
            })
            .await;

        for _ in 0..3 {
            let ranked = symbols(&client.call(RANKING_QUEUE, "10").await.unwrap());
            assert_eq!(ranked.len(), 10);
        }
        assert_eq!(client.stats().registered, 3);
    }

    // =============================================================================
    // FAILURE PATHS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_call_without_worker_times_out_then_stale_reply_is_dropped() {
        let broker = TestBroker::new();
        declare(&broker, PRICING_QUEUE).await;
        let client = broker.client(ClientConfig::default()).await;

        let err = client.call(PRICING_QUEUE, "3").await.unwrap_err();
        assert_eq!(
            err,
            RpcError::Timeout {
                queue: PRICING_QUEUE.to_string(),
                timeout: Duration::from_secs(5),
            }
        );
        assert_eq!(client.pending_count(), 0);
        assert_eq!(broker.broker.ready_count(PRICING_QUEUE), Some(1));

        // A worker that starts late still answers; nobody is waiting any more
        let (worker, _) = broker.spawn_pricing().await;
        while client.stats().unmatched == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(worker.worker.stats().replied, 1);
        assert!(!client.is_closed());

        // The reply queue keeps working after the mismatch
        let body = client.call(PRICING_QUEUE, "2").await.unwrap();
        assert!(body.starts_with(br#"[{"symbol":"P0""#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_request_is_rejected() {
        let broker = TestBroker::new();
        let (worker, calls) = broker.spawn_pricing().await;
        let client = broker.client(ClientConfig::default()).await;

        let err = client.call(PRICING_QUEUE, "lots").await.unwrap_err();
        assert!(err.is_timeout());

        assert_eq!(worker.worker.stats().rejected, 1);
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert_eq!(broker.broker.ready_count(PRICING_QUEUE), Some(0));
        assert_eq!(broker.broker.unacked_count(PRICING_QUEUE), Some(0));
    }

    #[tokio::test]
    async fn test_crashed_worker_request_is_redelivered() {
        let broker = TestBroker::new();
        let stalled = broker
            .spawn_worker(PRICING_QUEUE, 100, Arc::new(StallingFetch))
            .await;
        let client = broker.client(ClientConfig::default()).await;

        let call = tokio::spawn({
            let client = Arc::clone(&client);
            async move {
                client
                    .call_with_timeout(PRICING_QUEUE, "3", Duration::from_secs(30))
                    .await
            }
        });
        while broker.broker.unacked_count(PRICING_QUEUE) != Some(1) {
            tokio::task::yield_now().await;
        }

        // Dropping the run task drops its consumer; the broker requeues the request
        stalled.handle.abort();
        assert!(stalled.handle.await.unwrap_err().is_cancelled());

        let (_healthy, calls) = broker.spawn_pricing().await;
        let prices: Vec<serde_json::Value> =
            serde_json::from_slice(&call.await.unwrap().unwrap()).unwrap();
        assert_eq!(prices.len(), 3);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_shutdown_fails_waiting_calls() {
        let broker = TestBroker::new();
        declare(&broker, RANKING_QUEUE).await;
        let client = broker.client(ClientConfig::default()).await;

        let call = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.call(RANKING_QUEUE, "200").await }
        });
        while client.pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        client.shutdown().await;
        assert_eq!(call.await.unwrap(), Err(RpcError::Closed));
        assert!(client.is_closed());
        assert_eq!(client.call(RANKING_QUEUE, "1").await, Err(RpcError::Closed));
    }
}
