//! Bucket-resolution worker
//!
//! Claims pending time buckets from the catalog, resolves each to the match
//! IDs played in that window, and feeds the IDs to the batch workers. Every
//! failure is classified locally; nothing escapes an iteration except the
//! shutdown signal.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::api::{QuotaManager, SessionHandle, TelemetryApi};
use crate::catalog::{TimeBucket, WorkCatalog};
use crate::error::Result;
use crate::models::{GameMode, MatchId};
use crate::spider::wait_or_shutdown;

/// Upper bound on the quota backoff, regardless of time to window reset
pub(crate) const MAX_QUOTA_BACKOFF: Duration = Duration::from_secs(3600);

/// Long-running bucket-resolution loop, one per session
pub struct BucketWorker {
    pub id: usize,
    pub catalog: Arc<WorkCatalog>,
    pub api: Arc<dyn TelemetryApi>,
    pub quota: Arc<QuotaManager>,
    pub session: Arc<SessionHandle>,
    pub mode: GameMode,
    pub idle_wait: Duration,
    pub shutdown: watch::Receiver<bool>,
}

impl BucketWorker {
    pub async fn run(mut self) {
        tracing::info!(worker = self.id, "bucket worker started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let bucket = tokio::select! {
                claimed = self.catalog.claim_bucket(self.idle_wait) => claimed,
                _ = self.shutdown.changed() => break,
            };
            // Timed out on an empty queue; loop around (and re-check shutdown).
            let Some(bucket) = bucket else { continue };

            match self.resolve(&bucket).await {
                Ok(ids) => {
                    tracing::debug!(
                        worker = self.id,
                        bucket = %bucket.key,
                        matches = ids.len(),
                        "bucket resolved"
                    );
                    self.catalog.push_ids(ids).await;
                    self.catalog.complete_bucket(&bucket).await;
                }
                Err(e) if e.is_quota() => {
                    self.catalog.requeue_bucket(bucket).await;
                    let wait = self.quota.until_reset().min(MAX_QUOTA_BACKOFF);
                    tracing::warn!(
                        worker = self.id,
                        backoff_secs = wait.as_secs(),
                        "request budget exhausted, suspending bucket worker"
                    );
                    if wait_or_shutdown(&mut self.shutdown, wait).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        worker = self.id,
                        bucket = %bucket.key,
                        error = %e,
                        "bucket resolution failed, requeued"
                    );
                    self.catalog.requeue_bucket(bucket).await;
                }
            }
        }

        tracing::info!(worker = self.id, "bucket worker stopped");
    }

    async fn resolve(&self, bucket: &TimeBucket) -> Result<Vec<MatchId>> {
        let session = self.session.ensure_live().await?;
        self.api
            .list_match_ids(self.mode, &bucket.key, &session)
            .await
    }
}
