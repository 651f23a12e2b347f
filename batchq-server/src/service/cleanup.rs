//! Cleanup Sweeper
//!
//! Deletes terminal jobs whose completion is older than the retention window,
//! and at startup fails the jobs a previous process left processing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::repository::{JobStore, StoreResult};

/// Error recorded on jobs whose worker died with the previous process
pub const INTERRUPTED_MESSAGE: &str = "Job interrupted by a server restart before completion";

/// Fails the jobs left processing by a previous process
///
/// Must run before this process admits anything: every job claimed at or
/// before `cutoff` is treated as orphaned.
pub async fn recover_interrupted(store: &dyn JobStore, cutoff: DateTime<Utc>) -> StoreResult<u64> {
    let failed = store
        .fail_interrupted(cutoff, INTERRUPTED_MESSAGE, Utc::now())
        .await?;

    if failed > 0 {
        warn!("Failed {} job(s) interrupted by a previous shutdown", failed);
    }

    Ok(failed)
}

/// Runs one sweep, returning the number of deleted jobs
pub async fn sweep(store: &dyn JobStore, retention_days: u32) -> StoreResult<u64> {
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));
    let deleted = store.delete_terminal_before(cutoff).await?;

    if deleted > 0 {
        info!(
            "Cleanup removed {} job(s) completed before {}",
            deleted, cutoff
        );
    } else {
        debug!("Cleanup found nothing older than {}", cutoff);
    }

    Ok(deleted)
}

/// Sweeps immediately, then every `interval` until `shutdown` fires
pub async fn run_sweeper(
    store: Arc<dyn JobStore>,
    retention_days: u32,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            // the first tick completes immediately
            _ = ticker.tick() => {}
        }

        if let Err(e) = sweep(store.as_ref(), retention_days).await {
            error!("Cleanup sweep failed: {}", e);
        }
    }

    debug!("Cleanup sweeper stopped");
}
