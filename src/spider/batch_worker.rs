//! Batch-detail worker
//!
//! Drains discovered match IDs in fixed-size batches, fetches full details
//! through the remote API, and writes them to the match store. IDs whose
//! batch fails to fetch go back to the tail of the queue; store failures are
//! logged and skipped, since the idempotent upsert contract makes a later
//! manual re-fetch safe.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::api::{QuotaManager, SessionHandle, TelemetryApi};
use crate::catalog::WorkCatalog;
use crate::error::Result;
use crate::models::{MatchId, MatchRecord};
use crate::spider::bucket_worker::MAX_QUOTA_BACKOFF;
use crate::spider::wait_or_shutdown;
use crate::storage::MatchStore;

/// Long-running detail-fetch loop, one per session
pub struct BatchWorker {
    pub id: usize,
    pub catalog: Arc<WorkCatalog>,
    pub api: Arc<dyn TelemetryApi>,
    pub store: Arc<dyn MatchStore>,
    pub quota: Arc<QuotaManager>,
    pub session: Arc<SessionHandle>,
    pub batch_size: usize,
    pub idle_wait: Duration,
    pub shutdown: watch::Receiver<bool>,
}

impl BatchWorker {
    pub async fn run(mut self) {
        tracing::info!(worker = self.id, "batch worker started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let ids = self.catalog.claim_id_batch(self.batch_size).await;
            if ids.is_empty() {
                if wait_or_shutdown(&mut self.shutdown, self.idle_wait).await {
                    break;
                }
                continue;
            }

            let fresh = self.filter_unseen(ids).await;
            if fresh.is_empty() {
                continue;
            }

            match self.fetch(&fresh).await {
                Ok(records) => {
                    match self.store.upsert_batch(&records).await {
                        Ok(inserted) => {
                            tracing::debug!(
                                worker = self.id,
                                fetched = records.len(),
                                inserted,
                                "batch stored"
                            );
                        }
                        Err(e) => {
                            // Not requeued: the records were fetched and the
                            // upsert is replayable by hand.
                            tracing::error!(
                                worker = self.id,
                                batch = fresh.len(),
                                error = %e,
                                "match store write failed, continuing"
                            );
                        }
                    }
                }
                Err(e) if e.is_quota() => {
                    self.catalog.push_ids(fresh).await;
                    let wait = self.quota.until_reset().min(MAX_QUOTA_BACKOFF);
                    tracing::warn!(
                        worker = self.id,
                        backoff_secs = wait.as_secs(),
                        "request budget exhausted, suspending batch worker"
                    );
                    if wait_or_shutdown(&mut self.shutdown, wait).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        worker = self.id,
                        batch = fresh.len(),
                        error = %e,
                        "batch fetch failed, IDs returned to queue"
                    );
                    self.catalog.push_ids(fresh).await;
                }
            }
        }

        tracing::info!(worker = self.id, "batch worker stopped");
    }

    /// Drop IDs already present in the store.
    ///
    /// A failed existence check keeps the ID in the batch: fetching an
    /// already-stored match only costs one request, the upsert dedupes.
    async fn filter_unseen(&self, ids: Vec<MatchId>) -> Vec<MatchId> {
        let mut fresh = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.exists(&id).await {
                Ok(true) => {}
                Ok(false) => fresh.push(id),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "existence check failed");
                    fresh.push(id);
                }
            }
        }
        fresh
    }

    async fn fetch(&self, ids: &[MatchId]) -> Result<Vec<MatchRecord>> {
        let session = self.session.ensure_live().await?;
        self.api.fetch_match_details(ids, &session).await
    }
}
