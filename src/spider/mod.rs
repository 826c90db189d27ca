//! The spider: wiring and lifecycle
//!
//! [`Spider`] owns the shared catalog, quota manager, and shutdown signal.
//! `run` restores persisted state, spawns the maintenance loops and one
//! bucket-worker/batch-worker pair per session, then waits for ctrl-c (or a
//! programmatic [`Spider::shutdown`]), drains the workers, and writes one
//! final snapshot.

pub mod batch_worker;
pub mod bucket_worker;
pub mod maintenance;

pub use batch_worker::BatchWorker;
pub use bucket_worker::BucketWorker;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{QuotaManager, SessionHandle, TelemetryApi};
use crate::catalog::{SnapshotStore, WorkCatalog};
use crate::config::Config;
use crate::error::Result;
use crate::storage::MatchStore;

/// Sleep for `dur`, waking early on shutdown. Returns true once shut down.
pub(crate) async fn wait_or_shutdown(
    shutdown: &mut watch::Receiver<bool>,
    dur: Duration,
) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(dur) => false,
        changed = shutdown.changed() => match changed {
            Ok(()) => *shutdown.borrow(),
            // Sender dropped counts as shutdown.
            Err(_) => true,
        },
    }
}

/// Top-level harvester process
pub struct Spider {
    config: Config,
    catalog: Arc<WorkCatalog>,
    snapshots: Arc<SnapshotStore>,
    api: Arc<dyn TelemetryApi>,
    store: Arc<dyn MatchStore>,
    quota: Arc<QuotaManager>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl Spider {
    pub fn new(
        config: Config,
        api: Arc<dyn TelemetryApi>,
        store: Arc<dyn MatchStore>,
        quota: Arc<QuotaManager>,
    ) -> Result<Self> {
        let snapshots = Arc::new(SnapshotStore::new(&config.storage.snapshot_dir)?);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            catalog: Arc::new(WorkCatalog::new()),
            snapshots,
            api,
            store,
            quota,
            shutdown_tx: Arc::new(shutdown_tx),
        })
    }

    /// Request a graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Shared catalog, exposed for the status command and tests
    pub fn catalog(&self) -> Arc<WorkCatalog> {
        self.catalog.clone()
    }

    /// Run until ctrl-c or [`shutdown`](Self::shutdown), then drain and save.
    pub async fn run(&self) -> Result<()> {
        let now = Utc::now();
        self.catalog.load_state(&self.snapshots, now).await;
        let added = self.catalog.regenerate(now).await;
        tracing::info!(added, "initial catalog regeneration complete");

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        let spider_cfg = &self.config.spider;

        tasks.push(tokio::spawn(maintenance::snapshot_loop(
            self.catalog.clone(),
            self.snapshots.clone(),
            Duration::from_secs(spider_cfg.snapshot_interval_secs),
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(maintenance::regenerate_loop(
            self.catalog.clone(),
            Duration::from_secs(spider_cfg.regenerate_interval_secs),
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(maintenance::evict_loop(
            self.catalog.clone(),
            Duration::from_secs(spider_cfg.evict_interval_secs),
            self.shutdown_tx.subscribe(),
        )));

        let idle_wait = Duration::from_secs(spider_cfg.idle_wait_secs);
        for id in 0..spider_cfg.sessions {
            // Boot-time session failure is fatal: it means bad credentials
            // or an unreachable remote, not a transient worker condition.
            let session = Arc::new(
                SessionHandle::create(
                    self.api.clone(),
                    self.quota.clone(),
                    self.config.session_ttl(),
                )
                .await?,
            );

            tasks.push(tokio::spawn(
                BucketWorker {
                    id,
                    catalog: self.catalog.clone(),
                    api: self.api.clone(),
                    quota: self.quota.clone(),
                    session: session.clone(),
                    mode: self.config.api.mode,
                    idle_wait,
                    shutdown: self.shutdown_tx.subscribe(),
                }
                .run(),
            ));
            tasks.push(tokio::spawn(
                BatchWorker {
                    id,
                    catalog: self.catalog.clone(),
                    api: self.api.clone(),
                    store: self.store.clone(),
                    quota: self.quota.clone(),
                    session,
                    batch_size: spider_cfg.batch_size,
                    idle_wait,
                    shutdown: self.shutdown_tx.subscribe(),
                }
                .run(),
            ));
        }

        let ctrl_c = {
            let shutdown_tx = self.shutdown_tx.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, shutting down");
                    let _ = shutdown_tx.send(true);
                }
            })
        };

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "worker task panicked");
            }
        }
        ctrl_c.abort();

        // One forced snapshot so nothing discovered since the last periodic
        // save is lost.
        if let Err(e) = self.catalog.save_state(&self.snapshots).await {
            tracing::error!(error = %e, "final catalog snapshot failed");
        }

        let stats = self.catalog.stats().await;
        tracing::info!(
            completed = stats.completed,
            pending = stats.pending,
            discovered = stats.discovered,
            remaining_budget = self.quota.remaining(),
            "spider stopped"
        );
        Ok(())
    }
}
