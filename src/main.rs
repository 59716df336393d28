mod api;
mod config;
mod db;
mod enchants;
mod error;
mod ingest;
mod matcher;
mod nbt;
mod recommend;
mod signature;
mod text;
mod upstream;

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{router, ApiState};
use crate::config::{Config, SHUTDOWN_GRACE_SECS};
use crate::db::Store;
use crate::error::Result;
use crate::ingest::IngestLoop;
use crate::upstream::UpstreamClient;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let store = Store::connect(&cfg.database_url).await?;
    info!("database ready at {}", cfg.database_url);

    let upstream = UpstreamClient::new(&cfg)?;

    // Job form: mirror one snapshot, then exit.
    if std::env::args().any(|a| a == "--once") {
        let (_tx, rx) = watch::channel(false);
        let loop_ = IngestLoop::new(cfg, store.clone(), upstream, rx);
        let summary = loop_.run_cycle().await?;
        info!(
            pages = summary.pages,
            rows = summary.rows_upserted,
            finalized = summary.finalized,
            "one-shot ingest complete"
        );
        store.close().await;
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingest = IngestLoop::new(cfg.clone(), store.clone(), upstream, shutdown_rx);
    let ingest_handle = tokio::spawn(async move { ingest.run().await });

    let api_state = ApiState {
        store: store.clone(),
        alive_window_ms: cfg.alive_window_ms,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let the in-flight cycle finish, capped, then close the pool.
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(Duration::from_secs(SHUTDOWN_GRACE_SECS), ingest_handle)
        .await
        .is_err()
    {
        warn!("ingest cycle did not finish within {SHUTDOWN_GRACE_SECS}s, abandoning it");
    }
    store.close().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
