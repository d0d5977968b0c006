use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use throttlegate::config::{load_env_file, StoreBackend, ThrottleConfig};
use throttlegate::http::HttpServer;
use throttlegate::ratelimit::{RateLimiter, RateLimiterBackend};
use throttlegate::store::{MemoryStore, RedisStore};

/// Per-identity request throttling service.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Optional YAML configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment file loaded before configuration; defaults to `.env` if present
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Override the HTTP listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

/// How often the in-memory store drops expired counters and block flags.
const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let env_file = load_env_file(args.env_file.as_deref())?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);
    if args.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting Throttlegate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if let Some(env_file) = env_file {
        info!(path = %env_file.display(), "Loaded environment file");
    }

    let mut config = ThrottleConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    info!(
        ip_limit = config.ip_limit,
        token_limit = config.token_limit,
        block_duration = config.block_duration,
        store_backend = ?config.store_backend,
        "Configuration loaded"
    );

    let settings = config.limiter_settings()?;
    let rate_limiter: Arc<dyn RateLimiterBackend> = match config.store_backend {
        StoreBackend::Redis => {
            let store = RedisStore::connect(&config.redis_address, config.store_timeout()).await?;
            Arc::new(RateLimiter::with_settings(Arc::new(store), settings))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; limits are not shared between instances");
            let store = Arc::new(MemoryStore::new());
            store.spawn_purge_task(MEMORY_PURGE_INTERVAL);
            Arc::new(RateLimiter::with_settings(store, settings))
        }
    };
    info!("Rate limiter initialized");

    HttpServer::new(config.listen_addr, rate_limiter)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    info!("Throttlegate stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
