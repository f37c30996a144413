use std::sync::Arc;

use tokio::time::{interval, Duration};
use tracing::{error, info};

use busline_core::ExpirySweeper;

/// Periodic reclaim loop: expired holds are deleted, overdue pending
/// reservations flip to expired. Both sweeps are idempotent bulk
/// statements, so overlapping with the on-demand endpoints is harmless.
pub async fn start_sweep_worker(sweeper: Arc<ExpirySweeper>, interval_seconds: u64) {
    let mut ticker = interval(Duration::from_secs(interval_seconds));

    info!(interval_seconds, "Sweep worker started");

    loop {
        ticker.tick().await;

        if let Err(e) = sweeper.sweep_expired_holds().await {
            error!("Failed to sweep expired holds: {}", e);
        }
        if let Err(e) = sweeper.sweep_expired_reservations().await {
            error!("Failed to sweep expired reservations: {}", e);
        }
    }
}
