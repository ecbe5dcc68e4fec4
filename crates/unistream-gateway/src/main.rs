//! UniStream Gateway
//!
//! HTTP front door for UniStream: exposes one streaming chat endpoint over
//! every configured upstream provider, plus model management and caller
//! API-key storage. All protocol heterogeneity lives below, in
//! `unistream-providers`; this binary only validates, routes, and streams.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

mod config;
mod keys;
mod model_store;
mod routes;

use config::GatewayConfig;
use keys::KeyStore;
use model_store::ModelStore;
use routes::AppState;
use unistream_providers::ChatService;

#[derive(Parser, Debug)]
#[command(name = "unistream-gateway")]
#[command(about = "UniStream multi-provider chat streaming gateway", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "gateway.yaml")]
    config: String,

    /// Listen address
    #[arg(short, long)]
    listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Models file path
    #[arg(short, long)]
    models: Option<PathBuf>,

    /// API-key file path
    #[arg(short = 'k', long)]
    api_keys: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    info!("Starting UniStream Gateway");

    // Load configuration
    let config = GatewayConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Models file: {}", config.models_file.display());
    info!("API keys file: {}", config.api_keys_file.display());

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    // Initialize application state
    let service = ChatService::new(&config.models_file)
        .map_err(|e| anyhow::anyhow!("failed to initialize chat service: {e}"))?;
    info!("Serving {} models", service.model_ids().len());

    let state = AppState {
        service: Arc::new(service),
        models: Arc::new(ModelStore::new(&config.models_file)),
        keys: Arc::new(KeyStore::new(&config.api_keys_file)),
        metrics_handle,
    };

    // Build and run the server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.listen, config.port).parse()?;
    let app = routes::create_router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Gateway listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            warn!("Shutdown signal received, stopping server...");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("unistream=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("unistream=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "unistream_requests_total",
        "Total number of gateway requests by endpoint"
    );
    metrics::describe_counter!(
        "unistream_dispatch_total",
        "Total number of chat dispatches by outcome"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
