//! Application entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use secrecy::SecretString;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use order_webhook_watcher::api::create_router;
use order_webhook_watcher::app::{
    AppState, Backoff, ChainFetcher, DEFAULT_FETCH_LIMIT, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_POLL_INTERVAL, DeliveryEngine, OrderMatcher, PollLoop, WatcherService, WatcherStatus,
    spawn_poll_loop,
};
use order_webhook_watcher::config::{WatcherConfig, parse_markers, split_list};
use order_webhook_watcher::domain::{DedupStore, WebhookSender};
use order_webhook_watcher::infra::{
    ChainKind, DEFAULT_DEDUP_DIR, DEFAULT_HTTP_TIMEOUT, FileDedupStore, HttpWebhookSender,
    build_chain_source, build_http_client,
};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Watch addresses for order payments and deliver one webhook per transaction
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Address to watch; a comma-separated list starts one watcher per address
    addresses: String,

    /// Receiver URL for notification POSTs
    webhook_url: String,

    /// Explorer API key (required for evm)
    #[arg(env = "CHAIN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "CHAIN", default_value = "ton")]
    chain: ChainKind,

    /// Override the explorer base URL
    #[arg(long, env = "CHAIN_API_URL")]
    chain_api_url: Option<String>,

    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    poll_interval_secs: u64,

    #[arg(long, env = "FETCH_LIMIT", default_value_t = DEFAULT_FETCH_LIMIT)]
    fetch_limit: usize,

    #[arg(long, env = "FETCH_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    fetch_max_attempts: u32,

    #[arg(long, env = "FETCH_BACKOFF_SECS", default_value_t = 1)]
    fetch_backoff_secs: u64,

    #[arg(long, env = "FETCH_BACKOFF", default_value = "linear")]
    fetch_backoff: Backoff,

    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_HTTP_TIMEOUT.as_secs())]
    http_timeout_secs: u64,

    #[arg(long, env = "DEDUP_DIR", default_value = DEFAULT_DEDUP_DIR)]
    dedup_dir: PathBuf,

    /// Comma-separated, case-insensitive marker substrings
    #[arg(long, env = "ORDER_MARKERS")]
    order_markers: Option<String>,

    /// Regex whose first capture group is the order id
    #[arg(long, env = "ORDER_ID_PATTERN")]
    order_id_pattern: Option<String>,

    /// Ignore payloads on legs leaving the watched address
    #[arg(long, env = "INBOUND_ONLY", default_value_t = true, action = clap::ArgAction::Set)]
    inbound_only: bool,

    /// Serve the status API on this address
    #[arg(long, env = "STATUS_ADDR")]
    status_addr: Option<SocketAddr>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn into_config(self) -> WatcherConfig {
        WatcherConfig {
            addresses: split_list(&self.addresses),
            webhook_url: self.webhook_url,
            api_key: self
                .api_key
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            chain: self.chain,
            chain_api_url: self.chain_api_url.filter(|u| !u.is_empty()),
            poll_interval_secs: self.poll_interval_secs,
            fetch_limit: self.fetch_limit,
            fetch_max_attempts: self.fetch_max_attempts,
            fetch_backoff_secs: self.fetch_backoff_secs,
            fetch_backoff: self.fetch_backoff,
            http_timeout_secs: self.http_timeout_secs,
            dedup_dir: self.dedup_dir,
            order_markers: parse_markers(self.order_markers.as_deref()),
            order_id_pattern: self.order_id_pattern.filter(|p| !p.is_empty()),
            inbound_only: self.inbound_only,
            status_addr: self.status_addr,
        }
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!("Order webhook watcher v{}", env!("CARGO_PKG_VERSION"));

    let mut config = cli.into_config().validated()?;
    let match_policy = config.match_policy()?;
    let retry = config.retry_policy();

    info!(
        chain = %config.chain,
        addresses = config.addresses.len(),
        poll_interval_secs = config.poll_interval_secs,
        fetch_limit = config.fetch_limit,
        max_attempts = retry.max_attempts,
        backoff = %retry.backoff,
        markers = ?match_policy.markers(),
        inbound_only = match_policy.inbound_only(),
        dedup_dir = %config.dedup_dir.display(),
        "Configuration loaded"
    );
    if config.api_key.is_none() {
        warn!(chain = %config.chain, "No API key configured; explorer may rate-limit requests");
    }

    let http_client = build_http_client(config.http_timeout())?;
    let source = build_chain_source(
        config.chain,
        config.chain_api_url.clone(),
        config.api_key.take(),
        http_client.clone(),
    )?;
    let webhook: Arc<dyn WebhookSender> =
        Arc::new(HttpWebhookSender::new(http_client, config.webhook_url.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut state = AppState::new();
    let mut handles = Vec::with_capacity(config.addresses.len());

    for address in &config.addresses {
        let store: Arc<dyn DedupStore> =
            Arc::new(FileDedupStore::new(&config.dedup_dir, address));
        let service = WatcherService::new(
            ChainFetcher::new(Arc::clone(&source), address, config.fetch_limit, retry.clone()),
            OrderMatcher::new(match_policy.clone()),
            DeliveryEngine::new(Arc::clone(&store), Arc::clone(&webhook)),
        );
        let status = Arc::new(WatcherStatus::new(address));
        let poll_loop = PollLoop::new(Arc::new(service), Arc::clone(&status));

        handles.push(spawn_poll_loop(
            poll_loop,
            config.poll_interval(),
            shutdown_rx.clone(),
        ));
        state = state.with_watcher(status, store);
        info!(address = %address, source = source.name(), "Watcher started");
    }

    let server = match config.status_addr {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind status API on {addr}"))?;
            info!("Status API on http://{}", addr);
            info!("Swagger UI available at http://{}/swagger-ui", addr);

            let router = create_router(Arc::new(state));
            let mut server_shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = server_shutdown.changed().await;
                    })
                    .await
            }))
        }
        None => None,
    };

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Poll loop task failed");
        }
    }
    if let Some(server) = server {
        server.await??;
    }

    info!("Shutdown complete");
    Ok(())
}
