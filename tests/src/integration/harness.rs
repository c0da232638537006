//! Shared fixtures: an in-process broker with real workers and fake upstreams.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;
use shared_broker::InMemoryBroker;
use shared_rpc::{
    ClientConfig, FetchData, FetchError, FetchParams, RpcClient, RpcWorker, WorkerConfig,
    WorkerExit, PRICING_QUEUE, RANKING_QUEUE,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tc_01_pricing::{ListingsSource, PricingService};
use tc_02_ranking::{PageSource, RankingService};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// =============================================================================
// FAKE UPSTREAMS
// =============================================================================

/// CoinMarketCap stand-in: coin `i` is `P{i}` priced at `i + 0.5`.
#[derive(Default)]
pub struct FakeListings {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ListingsSource for FakeListings {
    async fn latest_listings(&self, limit: usize) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let data: Vec<_> = (0..limit)
            .map(|i| json!({"symbol": format!("P{i}"), "quote": {"USD": {"price": i as f64 + 0.5}}}))
            .collect();
        let body = json!({"status": {"error_code": 0}, "data": data});
        Ok(Bytes::from(body.to_string()))
    }
}

/// CryptoCompare stand-in with `total` coins named `R{rank}`.
pub struct FakePages {
    total: usize,
    pub requested: Arc<Mutex<Vec<usize>>>,
}

impl FakePages {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl PageSource for FakePages {
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Bytes, FetchError> {
        self.requested.lock().push(page);
        let start = (page * page_size).min(self.total);
        let end = ((page + 1) * page_size).min(self.total);
        let data: Vec<_> = (start..end)
            .map(|i| json!({"CoinInfo": {"Name": format!("R{i}")}}))
            .collect();
        Ok(Bytes::from(json!({"Response": "Success", "Data": data}).to_string()))
    }
}

/// Never finishes a fetch, like a worker wedged on a dead upstream.
pub struct StallingFetch;

#[async_trait]
impl FetchData for StallingFetch {
    async fn fetch(&self, _params: FetchParams) -> Result<Bytes, FetchError> {
        std::future::pending().await
    }
}

// =============================================================================
// BROKER + WORKERS
// =============================================================================

/// A spawned worker and its run task.
pub struct SpawnedWorker {
    pub worker: Arc<RpcWorker>,
    pub handle: JoinHandle<WorkerExit>,
}

/// In-process broker hosting any number of workers and clients.
///
/// Dropping it cancels every worker it spawned.
pub struct TestBroker {
    pub broker: InMemoryBroker,
    shutdown: CancellationToken,
}

impl Default for TestBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBroker {
    pub fn new() -> Self {
        Self {
            broker: InMemoryBroker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Start a worker on its own channel; returns once it is consuming.
    pub async fn spawn_worker(
        &self,
        queue: &str,
        default_count: usize,
        capability: Arc<dyn FetchData>,
    ) -> SpawnedWorker {
        let before = self.broker.consumer_count(queue).unwrap_or(0);
        let worker = Arc::new(RpcWorker::new(
            Arc::new(self.broker.channel()),
            WorkerConfig::for_queue(queue, default_count),
            capability,
        ));

        let runner = Arc::clone(&worker);
        let shutdown = self.shutdown.child_token();
        let handle = tokio::spawn(async move { runner.run(shutdown).await });

        while self.broker.consumer_count(queue).unwrap_or(0) <= before {
            tokio::task::yield_now().await;
        }
        SpawnedWorker { worker, handle }
    }

    /// Pricing worker over [`FakeListings`]; returns its upstream call counter.
    pub async fn spawn_pricing(&self) -> (SpawnedWorker, Arc<AtomicUsize>) {
        let listings = FakeListings::default();
        let calls = Arc::clone(&listings.calls);
        let service = Arc::new(PricingService::new(listings));
        let worker = self
            .spawn_worker(PRICING_QUEUE, tc_01_pricing::DEFAULT_COUNT, service)
            .await;
        (worker, calls)
    }

    /// Ranking worker over [`FakePages`]; returns the pages it requested.
    pub async fn spawn_ranking(&self, total: usize) -> (SpawnedWorker, Arc<Mutex<Vec<usize>>>) {
        let pages = FakePages::new(total);
        let requested = Arc::clone(&pages.requested);
        let service = Arc::new(RankingService::new(pages));
        let worker = self
            .spawn_worker(RANKING_QUEUE, tc_02_ranking::DEFAULT_COUNT, service)
            .await;
        (worker, requested)
    }

    pub async fn client(&self, config: ClientConfig) -> Arc<RpcClient> {
        Arc::new(
            RpcClient::connect(Arc::new(self.broker.channel()), config)
                .await
                .expect("client connects to the in-process broker"),
        )
    }
}

impl Drop for TestBroker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
