//! Background workers.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::service::DocumentService;

/// Start the periodic stale-document sweep.
/// This should be called once on server startup; it stops when `shutdown` is cancelled.
pub fn start_cleanup_sweeper(
    service: Arc<DocumentService>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let cleanup = service.config.cleanup.clone();
        if !cleanup.scheduler_enabled {
            info!("Cleanup sweeper disabled");
            return;
        }

        let period = cleanup.sweep_interval().max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = period.as_secs(),
            max_age_secs = cleanup.max_age_secs,
            "Cleanup sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Cleanup sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    service.sweep_stale_documents(cleanup.max_age()).await;
                }
            }
        }
    })
}
