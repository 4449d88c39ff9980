//! Micro-gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!   snapshot dirs ──▶ SnapshotLoader ──▶ SnapshotStore ──▶ IndexQueue ──▶ IndexWorker
//!   (watcher)                               │                               │
//!                                           │◀──────── Route Entries ───────┘
//!                                           ▼
//!   Client ──▶ gateway listener ──▶ acquire lease ──▶ match ──▶ rate limit ──▶ resolve ──▶ pipeline
//!
//!   collaborators ──▶ store listener: GET /current, GET /release?id=
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use microgateway::config::load_or_default;
use microgateway::http::{AppState, GatewayServer};
use microgateway::index::{IndexBuilder, IndexQueue, IndexWorker};
use microgateway::lifecycle::{signals, Shutdown};
use microgateway::observability::{logging, metrics};
use microgateway::store::watcher::{run_load_loop, SnapshotWatcher};
use microgateway::store::{SnapshotLoader, SnapshotManager, SnapshotStore};

const WATCH_SETTLE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "microgateway")]
#[command(about = "API gateway routing core", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Arc::new(load_or_default(args.config.as_deref())?);

    logging::init_logging(&config.observability.log_level);
    tracing::info!("microgateway v0.1.0 starting");
    tracing::info!(
        gateway_address = %config.listener.bind_address,
        store_address = %config.store.bind_address,
        config_root = ?config.store.config_root,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();

    let (queue, index_rx) = IndexQueue::new();
    let store = Arc::new(SnapshotStore::new(config.store.config_root.clone()).with_index_queue(queue.clone()));
    let manager = Arc::new(SnapshotManager::new(Arc::clone(&store)));
    let worker = IndexWorker::new(IndexBuilder::new(Arc::clone(&store)), queue.clone(), index_rx);
    tokio::spawn(worker.run(shutdown.subscribe()));

    let loader = SnapshotLoader::new(Arc::clone(&manager), queue);
    match loader.load_latest(&config.store.config_root).await {
        Ok(Some(id)) => tracing::info!(snapshot_id = %id, "Initial snapshot installed"),
        Ok(None) => tracing::warn!("No snapshot directory found, requests wait for one"),
        Err(e) => tracing::error!(error = %e, "Failed to load initial snapshot"),
    }

    // Dropping the watcher stops it; keep it for the life of the server.
    let _watcher = if config.store.watch {
        let (watcher, paths) = SnapshotWatcher::new(&config.store.config_root);
        let watcher = watcher.run()?;
        tokio::spawn(run_load_loop(loader, paths, shutdown.subscribe(), WATCH_SETTLE));
        Some(watcher)
    } else {
        None
    };

    let gateway_listener = TcpListener::bind(&config.listener.bind_address).await?;
    let store_listener = TcpListener::bind(&config.store.bind_address).await?;

    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = GatewayServer::new(AppState::new(manager, Arc::clone(&config)));
    server.run(gateway_listener, store_listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
