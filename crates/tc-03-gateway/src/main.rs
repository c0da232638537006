//! # TC-Gateway
//!
//! Serves the merged top-coins view over HTTP.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging and metrics
//! 2. Load gateway and client configuration (env, then CLI flags)
//! 3. Connect to the broker, declare both work queues, start the RPC client
//! 4. Serve HTTP until Ctrl+C, then drain the client

use anyhow::{Context, Result};
use clap::Parser;
use shared_broker::{AmqpConnection, BrokerLink, QueueOptions, DEFAULT_AMQP_URI};
use shared_rpc::{ClientConfig, RpcClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tc_03_gateway::{router, Gateway, GatewayConfig};
use topcoins_telemetry::TelemetryConfig;
use tracing::{info, warn};

/// TC-Gateway: merges pricing and ranking into one JSON response
#[derive(Parser, Debug)]
#[command(name = "tc-gateway", version)]
#[command(about = "HTTP gateway over the pricing and ranking workers")]
struct Args {
    /// Broker URI
    #[arg(long, env = "TC_AMQP_URI", default_value = DEFAULT_AMQP_URI)]
    amqp_uri: String,

    /// HTTP bind address (overrides TC_GATEWAY_HOST / TC_GATEWAY_PORT)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Records requested from each worker (overrides TC_GATEWAY_LIMIT)
    #[arg(long)]
    limit: Option<usize>,

    /// Bound on one worker call, e.g. `5s` (overrides TC_CALL_TIMEOUT)
    #[arg(long, value_parser = humantime::parse_duration)]
    call_timeout: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    topcoins_telemetry::init_telemetry(&TelemetryConfig::for_service("tc-gateway"))
        .context("Failed to initialize telemetry")?;

    let mut config = GatewayConfig::default()
        .with_env_overrides()
        .context("Invalid gateway configuration")?;
    if let Some(bind) = args.bind {
        config.host = bind.ip();
        config.port = bind.port();
    }
    if let Some(limit) = args.limit {
        config.per_call_limit = limit;
    }
    config.validate().context("Invalid gateway configuration")?;

    let mut client_config = ClientConfig::default()
        .with_env_overrides()
        .context("Invalid client configuration")?;
    if let Some(timeout) = args.call_timeout {
        client_config.call_timeout = timeout;
    }
    client_config
        .validate()
        .context("Invalid client configuration")?;

    let connection = AmqpConnection::connect(&args.amqp_uri)
        .await
        .context("Failed to connect to broker")?;
    let link: Arc<dyn BrokerLink> = Arc::new(
        connection
            .open_link()
            .await
            .context("Failed to open broker channel")?,
    );

    // Requests published before a worker starts wait in the queue
    for queue in [&config.pricing_queue, &config.ranking_queue] {
        link.declare_queue(queue, QueueOptions::work_queue())
            .await
            .with_context(|| format!("Failed to declare {queue}"))?;
    }

    let client = Arc::new(
        RpcClient::connect(Arc::clone(&link), client_config)
            .await
            .context("Failed to start RPC client")?,
    );

    let addr = config.bind_addr();
    let gateway = Arc::new(Gateway::new(client.clone(), config));
    let app = router(gateway);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Gateway listening. Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    client.shutdown().await;
    if let Err(e) = connection.close().await {
        warn!(error = %e, "Failed to close broker connection");
    }
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
    }
}
