use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod api;
mod config;
mod db;
mod error;
mod ocr;
mod processor;
mod registry;
mod service;
#[cfg(test)]
mod test_support;

use crate::db::Database;
use crate::service::DocumentService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!(
        "Starting document relay service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Arc::new(config::load_config()?);
    info!(
        host = %config.server.host,
        port = config.server.port,
        processor = %config.processor.base_url,
        poll_budget_secs = config.processor.max_poll_duration().as_secs(),
        "Configuration loaded"
    );

    let db_path = config.storage.data_dir.join("docrelay.db");
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    let ocr_engine = ocr::build_engine(&config.ocr)?;

    let service = Arc::new(DocumentService::new(config.clone(), ocr_engine, db)?);

    // Periodic reclaim of stale documents, stopped on shutdown
    let shutdown = CancellationToken::new();
    let sweeper = service::start_cleanup_sweeper(service.clone(), shutdown.clone());

    let app = api::router(service);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Cleanup sweeper ended abnormally");
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docrelay_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
