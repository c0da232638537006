//! # TC-Pricing Worker
//!
//! Serves `pricing_queue` until Ctrl+C or a broker failure.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging and metrics
//! 2. Load worker and upstream configuration (env, then CLI flags)
//! 3. Connect to the broker and open a channel
//! 4. Consume requests until shutdown

use anyhow::{Context, Result};
use clap::Parser;
use shared_broker::{AmqpConnection, DEFAULT_AMQP_URI};
use shared_rpc::{RpcWorker, WorkerConfig, WorkerExit, PRICING_QUEUE};
use std::sync::Arc;
use std::time::Duration;
use tc_01_pricing::{CoinMarketCapClient, PricingService, UpstreamConfig, DEFAULT_COUNT};
use tokio_util::sync::CancellationToken;
use topcoins_telemetry::TelemetryConfig;
use tracing::{info, warn};

/// TC-Pricing: serves coin prices over the pricing queue
#[derive(Parser, Debug)]
#[command(name = "tc-pricing", version)]
#[command(about = "Pricing worker backed by CoinMarketCap")]
struct Args {
    /// Broker URI
    #[arg(long, env = "TC_AMQP_URI", default_value = DEFAULT_AMQP_URI)]
    amqp_uri: String,

    /// Work queue (overrides TC_QUEUE)
    #[arg(long)]
    queue: Option<String>,

    /// Unacknowledged requests held at once (overrides TC_PREFETCH)
    #[arg(long)]
    prefetch: Option<u16>,

    /// Listings endpoint
    #[arg(long, env = "TC_CMC_API_URL", default_value = tc_01_pricing::config::DEFAULT_API_URL)]
    api_url: String,

    /// Bound on one upstream request, e.g. `10s`
    #[arg(long, env = "TC_UPSTREAM_TIMEOUT", value_parser = humantime::parse_duration)]
    upstream_timeout: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    topcoins_telemetry::init_telemetry(&TelemetryConfig::for_service("tc-pricing"))
        .context("Failed to initialize telemetry")?;

    let mut worker_config = WorkerConfig::for_queue(PRICING_QUEUE, DEFAULT_COUNT)
        .with_env_overrides()
        .context("Invalid worker configuration")?;
    if let Some(queue) = args.queue {
        worker_config.queue = queue;
    }
    if let Some(prefetch) = args.prefetch {
        worker_config.prefetch = prefetch;
    }
    worker_config
        .validate()
        .context("Invalid worker configuration")?;

    let mut upstream = UpstreamConfig::from_env();
    upstream.api_url = args.api_url;
    if let Some(timeout) = args.upstream_timeout {
        upstream.request_timeout = timeout;
    }
    upstream.validate().context("Invalid upstream configuration")?;

    let source = CoinMarketCapClient::new(&upstream).context("Failed to build HTTP client")?;

    let connection = AmqpConnection::connect(&args.amqp_uri)
        .await
        .context("Failed to connect to broker")?;
    let link = connection
        .open_link()
        .await
        .context("Failed to open broker channel")?;

    let worker = RpcWorker::new(
        Arc::new(link),
        worker_config,
        Arc::new(PricingService::new(source)),
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    info!(queue = worker.queue(), "Pricing worker running. Press Ctrl+C to stop.");
    let exit = worker.run(shutdown).await;

    if let Err(e) = connection.close().await {
        warn!(error = %e, "Failed to close broker connection");
    }

    match exit {
        WorkerExit::Cancelled => Ok(()),
        WorkerExit::StreamClosed => anyhow::bail!("Broker closed the request stream"),
        WorkerExit::Failed(e) => Err(e).context("Pricing worker failed"),
    }
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
            shutdown.cancel();
        }
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
    }
}
