//! Periodic catalog maintenance
//!
//! Three independent loops: durable snapshots, bucket regeneration, and
//! eviction of stale completed entries. Each loop logs and swallows errors
//! from its single action; a failed action never terminates the loop. All
//! three observe the shutdown signal at their sleep points.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::catalog::{SnapshotStore, WorkCatalog};
use crate::spider::wait_or_shutdown;

/// Periodically persist the catalog to disk
pub async fn snapshot_loop(
    catalog: Arc<WorkCatalog>,
    snapshots: Arc<SnapshotStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "snapshot loop started");
    loop {
        if wait_or_shutdown(&mut shutdown, interval).await {
            break;
        }
        match catalog.save_state(&snapshots).await {
            Ok(()) => tracing::debug!("catalog snapshot written"),
            Err(e) => tracing::error!(error = %e, "catalog snapshot failed"),
        }
    }
    tracing::info!("snapshot loop stopped");
}

/// Periodically enqueue newly elapsed buckets.
///
/// Runs once immediately so a fresh process has work before the first tick.
pub async fn regenerate_loop(
    catalog: Arc<WorkCatalog>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "regenerate loop started");
    loop {
        let added = catalog.regenerate(Utc::now()).await;
        if added > 0 {
            tracing::info!(added, "new buckets enqueued");
        }
        if wait_or_shutdown(&mut shutdown, interval).await {
            break;
        }
    }
    tracing::info!("regenerate loop stopped");
}

/// Periodically drop completed buckets past the retention window
pub async fn evict_loop(
    catalog: Arc<WorkCatalog>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "evict loop started");
    loop {
        if wait_or_shutdown(&mut shutdown, interval).await {
            break;
        }
        catalog.evict_old(Utc::now()).await;
    }
    tracing::info!("evict loop stopped");
}
