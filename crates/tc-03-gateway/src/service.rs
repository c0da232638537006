//! Gateway service: one pricing call and one ranking call, run concurrently.

use crate::config::GatewayConfig;
use crate::ports::RpcCaller;
use bytes::{Bytes, BytesMut};
use shared_rpc::{FetchParams, RpcError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Replies from both workers for one gateway request.
#[derive(Debug)]
pub struct TopCoins {
    pub pricing: Result<Bytes, RpcError>,
    pub ranking: Result<Bytes, RpcError>,
}

impl TopCoins {
    /// Both calls succeeded.
    pub fn is_complete(&self) -> bool {
        self.pricing.is_ok() && self.ranking.is_ok()
    }

    /// Neither call succeeded.
    pub fn is_empty(&self) -> bool {
        self.pricing.is_err() && self.ranking.is_err()
    }

    /// Name of the single failed source, when exactly one call failed.
    pub fn missing_source(&self) -> Option<&'static str> {
        match (&self.pricing, &self.ranking) {
            (Err(_), Ok(_)) => Some("pricing"),
            (Ok(_), Err(_)) => Some("ranking"),
            _ => None,
        }
    }

    /// Successful payloads concatenated byte for byte, pricing first.
    pub fn body(&self) -> Bytes {
        let parts: Vec<&Bytes> = [&self.pricing, &self.ranking]
            .into_iter()
            .filter_map(|result| result.as_ref().ok())
            .collect();
        let mut body = BytesMut::with_capacity(parts.iter().map(|part| part.len()).sum());
        for part in parts {
            body.extend_from_slice(part);
        }
        body.freeze()
    }

    /// Errors of the failed calls, labelled by source.
    pub fn errors(&self) -> Vec<(&'static str, &RpcError)> {
        [("pricing", &self.pricing), ("ranking", &self.ranking)]
            .into_iter()
            .filter_map(|(source, result)| result.as_ref().err().map(|e| (source, e)))
            .collect()
    }
}

/// Merges the pricing and ranking workers' answers.
pub struct Gateway {
    caller: Arc<dyn RpcCaller>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(caller: Arc<dyn RpcCaller>, config: GatewayConfig) -> Self {
        Self { caller, config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn caller(&self) -> &Arc<dyn RpcCaller> {
        &self.caller
    }

    /// Call both workers concurrently and collect their replies.
    ///
    /// A failed call never cancels the other one.
    pub async fn top_coins(&self) -> TopCoins {
        let request = FetchParams::new(self.config.per_call_limit).encode();

        let (pricing, ranking) = tokio::join!(
            self.caller.call(&self.config.pricing_queue, request.clone()),
            self.caller.call(&self.config.ranking_queue, request),
        );

        for (queue, result) in [
            (&self.config.pricing_queue, &pricing),
            (&self.config.ranking_queue, &ranking),
        ] {
            match result {
                Ok(body) => debug!(queue = %queue, bytes = body.len(), "Worker replied"),
                Err(e) => warn!(queue = %queue, error = %e, "Worker call failed"),
            }
        }

        TopCoins { pricing, ranking }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Barrier;

    /// Answers each queue with a fixed result and records the requests.
    pub(crate) struct FakeCaller {
        replies: HashMap<String, Result<Bytes, RpcError>>,
        pub(crate) requests: Mutex<Vec<(String, Bytes)>>,
        barrier: Option<Barrier>,
        pub(crate) closed: bool,
    }

    impl FakeCaller {
        pub(crate) fn new(
            pricing: Result<&'static str, RpcError>,
            ranking: Result<&'static str, RpcError>,
        ) -> Self {
            let mut replies = HashMap::new();
            replies.insert("pricing_queue".to_string(), pricing.map(static_bytes));
            replies.insert("ranking_queue".to_string(), ranking.map(static_bytes));
            Self {
                replies,
                requests: Mutex::new(Vec::new()),
                barrier: None,
                closed: false,
            }
        }

        /// Calls only complete once both are in flight.
        fn rendezvous(mut self) -> Self {
            self.barrier = Some(Barrier::new(2));
            self
        }
    }

    fn static_bytes(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[async_trait]
    impl RpcCaller for FakeCaller {
        async fn call(&self, queue: &str, body: Bytes) -> Result<Bytes, RpcError> {
            self.requests.lock().push((queue.to_string(), body));
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            self.replies
                .get(queue)
                .cloned()
                .unwrap_or(Err(RpcError::Transport(format!("no such queue {queue}"))))
        }

        fn is_closed(&self) -> bool {
            self.closed
        }

        fn pending_count(&self) -> usize {
            0
        }
    }

    pub(crate) fn timeout(queue: &str) -> RpcError {
        RpcError::Timeout {
            queue: queue.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_concatenates_pricing_then_ranking() {
        let caller = Arc::new(FakeCaller::new(Ok(r#"[{"symbol":"BTC"}]"#), Ok(r#"["BTC"]"#)));
        let gateway = Gateway::new(caller.clone(), GatewayConfig::default());

        let coins = gateway.top_coins().await;
        assert!(coins.is_complete());
        assert_eq!(&coins.body()[..], br#"[{"symbol":"BTC"}]["BTC"]"#);
    }

    #[tokio::test]
    async fn test_requests_per_call_limit_from_both_queues() {
        let caller = Arc::new(FakeCaller::new(Ok("[]"), Ok("[]")));
        let gateway = Gateway::new(caller.clone(), GatewayConfig::default());
        gateway.top_coins().await;

        let mut requests = caller.requests.lock().clone();
        requests.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            requests,
            vec![
                ("pricing_queue".to_string(), Bytes::from_static(b"100")),
                ("ranking_queue".to_string(), Bytes::from_static(b"100")),
            ]
        );
    }

    #[tokio::test]
    async fn test_calls_run_concurrently() {
        let caller = Arc::new(FakeCaller::new(Ok("[1]"), Ok("[2]")).rendezvous());
        let gateway = Gateway::new(caller, GatewayConfig::default());

        // Serialized calls would never pass the two-party barrier
        let coins = tokio::time::timeout(Duration::from_secs(1), gateway.top_coins())
            .await
            .unwrap();
        assert_eq!(&coins.body()[..], b"[1][2]");
    }

    #[tokio::test]
    async fn test_one_failure_keeps_other_payload() {
        let caller = Arc::new(FakeCaller::new(Ok("[1]"), Err(timeout("ranking_queue"))));
        let gateway = Gateway::new(caller, GatewayConfig::default());

        let coins = gateway.top_coins().await;
        assert!(!coins.is_complete());
        assert!(!coins.is_empty());
        assert_eq!(coins.missing_source(), Some("ranking"));
        assert_eq!(&coins.body()[..], b"[1]");
        assert_eq!(coins.errors().len(), 1);
        assert!(coins.errors()[0].1.is_timeout());
    }

    #[tokio::test]
    async fn test_both_failures() {
        let caller = Arc::new(FakeCaller::new(
            Err(RpcError::Transport("channel closed".into())),
            Err(timeout("ranking_queue")),
        ));
        let gateway = Gateway::new(caller, GatewayConfig::default());

        let coins = gateway.top_coins().await;
        assert!(coins.is_empty());
        assert_eq!(coins.missing_source(), None);
        assert!(coins.body().is_empty());
        assert_eq!(
            coins.errors().iter().map(|(s, _)| *s).collect::<Vec<_>>(),
            ["pricing", "ranking"]
        );
    }
}
