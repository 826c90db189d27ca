//! End-to-end worker pipeline tests with scripted fakes
//!
//! A real catalog and real workers run against the in-memory API and store
//! doubles. Tests drive the pipeline until it quiesces, then shut it down
//! through the same watch channel the process uses.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, TimeZone, Utc};
use tokio::sync::watch;

use common::{FakeApi, FakeStore};
use matchwatch::api::{QuotaCaps, QuotaManager, SessionHandle, TelemetryApi};
use matchwatch::catalog::{BucketKey, WorkCatalog};
use matchwatch::models::GameMode;
use matchwatch::spider::{BatchWorker, BucketWorker};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 20, 12, 35, 0).unwrap()
}

/// First two bucket keys the generator emits for the fixed clock
fn oldest_keys() -> (BucketKey, BucketKey) {
    let day = now().date_naive().checked_sub_days(Days::new(31)).unwrap();
    (BucketKey::new(day, 0, 0), BucketKey::new(day, 0, 1))
}

fn quota() -> Arc<QuotaManager> {
    Arc::new(QuotaManager::new(QuotaCaps {
        requests_per_day: 100_000,
        sessions_per_day: 100,
        concurrent_sessions: 10,
    }))
}

const IDLE: Duration = Duration::from_millis(25);
const TTL: Duration = Duration::from_secs(900);

async fn session(api: Arc<dyn TelemetryApi>, quota: Arc<QuotaManager>) -> Arc<SessionHandle> {
    Arc::new(SessionHandle::create(api, quota, TTL).await.unwrap())
}

/// Poll until `check` passes or the deadline hits; panics with `what` on timeout.
async fn eventually<F, Fut>(what: &str, check: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for: {what}");
}

#[tokio::test]
async fn test_buckets_flow_to_stored_matches() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(FakeStore::new());
    let catalog = Arc::new(WorkCatalog::new());
    let quota = quota();
    let (shutdown_tx, _) = watch::channel(false);

    let (first, second) = oldest_keys();
    api.script_bucket(first, &["1", "2", "3"]);
    api.script_bucket(second, &["4", "5"]);

    catalog.regenerate(now()).await;
    let total = catalog.stats().await.pending;

    let handle = session(api.clone(), quota.clone()).await;
    let bucket_task = tokio::spawn(
        BucketWorker {
            id: 0,
            catalog: catalog.clone(),
            api: api.clone(),
            quota: quota.clone(),
            session: handle.clone(),
            mode: GameMode::Siege,
            idle_wait: IDLE,
            shutdown: shutdown_tx.subscribe(),
        }
        .run(),
    );
    let batch_task = tokio::spawn(
        BatchWorker {
            id: 0,
            catalog: catalog.clone(),
            api: api.clone(),
            store: store.clone(),
            quota: quota.clone(),
            session: handle,
            batch_size: 25,
            idle_wait: IDLE,
            shutdown: shutdown_tx.subscribe(),
        }
        .run(),
    );

    eventually("all buckets completed and matches stored", || {
        let catalog = catalog.clone();
        let store = store.clone();
        async move { catalog.stats().await.completed == total && store.len() == 5 }
    })
    .await;

    shutdown_tx.send(true).unwrap();
    bucket_task.await.unwrap();
    batch_task.await.unwrap();

    let mut stored = store.stored_ids();
    stored.sort();
    assert_eq!(stored, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(catalog.stats().await.discovered, 0);
    // One worker pair shares one session; nothing forced a renewal.
    assert_eq!(api.sessions_created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_batches_are_cut_at_the_configured_size() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(FakeStore::new());
    let catalog = Arc::new(WorkCatalog::new());
    let quota = quota();
    let (shutdown_tx, _) = watch::channel(false);

    let ids: Vec<String> = (1..=30).map(|i| i.to_string()).collect();
    catalog.push_ids(ids).await;

    let handle = session(api.clone(), quota.clone()).await;
    let batch_task = tokio::spawn(
        BatchWorker {
            id: 0,
            catalog: catalog.clone(),
            api: api.clone(),
            store: store.clone(),
            quota: quota.clone(),
            session: handle,
            batch_size: 25,
            idle_wait: IDLE,
            shutdown: shutdown_tx.subscribe(),
        }
        .run(),
    );

    eventually("all 30 matches stored", || {
        let store = store.clone();
        async move { store.len() == 30 }
    })
    .await;

    shutdown_tx.send(true).unwrap();
    batch_task.await.unwrap();

    assert_eq!(*api.detail_batches.lock().unwrap(), vec![25, 5]);
}

#[tokio::test]
async fn test_quota_exhaustion_requeues_instead_of_losing_work() {
    let api = Arc::new(FakeApi::new());
    let catalog = Arc::new(WorkCatalog::new());
    let quota = quota();
    let (shutdown_tx, _) = watch::channel(false);

    api.listing_quota_exhausted.store(true, Ordering::SeqCst);
    catalog.regenerate(now()).await;
    let total = catalog.stats().await.pending;

    let handle = session(api.clone(), quota.clone()).await;
    let bucket_task = tokio::spawn(
        BucketWorker {
            id: 0,
            catalog: catalog.clone(),
            api: api.clone(),
            quota: quota.clone(),
            session: handle,
            mode: GameMode::Siege,
            idle_wait: IDLE,
            shutdown: shutdown_tx.subscribe(),
        }
        .run(),
    );

    // The worker claims one bucket, hits the budget, requeues it, and
    // suspends itself until the next window.
    eventually("bucket requeued after quota failure", || {
        let catalog = catalog.clone();
        let api = api.clone();
        async move {
            let attempted = api.list_calls.load(Ordering::SeqCst) >= 1;
            let stats = catalog.stats().await;
            attempted && stats.pending == total && stats.in_flight == 0 && stats.completed == 0
        }
    })
    .await;

    shutdown_tx.send(true).unwrap();
    bucket_task.await.unwrap();

    // The failed attempt is remembered on the bucket.
    let retried = catalog.claim_bucket(Duration::from_millis(10)).await.unwrap();
    assert_eq!(retried.fail_count, 1);
}

#[tokio::test]
async fn test_already_stored_matches_are_not_refetched() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(FakeStore::new());
    let catalog = Arc::new(WorkCatalog::new());
    let quota = quota();
    let (shutdown_tx, _) = watch::channel(false);

    store.seed("1");
    store.seed("2");
    catalog
        .push_ids(vec!["1".into(), "2".into(), "3".into()])
        .await;

    let handle = session(api.clone(), quota.clone()).await;
    let batch_task = tokio::spawn(
        BatchWorker {
            id: 0,
            catalog: catalog.clone(),
            api: api.clone(),
            store: store.clone(),
            quota: quota.clone(),
            session: handle,
            batch_size: 25,
            idle_wait: IDLE,
            shutdown: shutdown_tx.subscribe(),
        }
        .run(),
    );

    eventually("unseen match stored", || {
        let store = store.clone();
        async move { store.len() == 1 }
    })
    .await;

    shutdown_tx.send(true).unwrap();
    batch_task.await.unwrap();

    assert_eq!(store.stored_ids(), vec!["3".to_string()]);
    // Only the unseen ID went over the wire.
    assert_eq!(*api.detail_batches.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn test_store_failure_does_not_requeue_the_batch() {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(FakeStore::new());
    let catalog = Arc::new(WorkCatalog::new());
    let quota = quota();
    let (shutdown_tx, _) = watch::channel(false);

    store.fail_writes.store(true, Ordering::SeqCst);
    catalog.push_ids(vec!["1".into(), "2".into()]).await;

    let handle = session(api.clone(), quota.clone()).await;
    let batch_task = tokio::spawn(
        BatchWorker {
            id: 0,
            catalog: catalog.clone(),
            api: api.clone(),
            store: store.clone(),
            quota: quota.clone(),
            session: handle,
            batch_size: 25,
            idle_wait: IDLE,
            shutdown: shutdown_tx.subscribe(),
        }
        .run(),
    );

    // The batch is fetched once; after the failed write the IDs are gone
    // from the queue and the worker goes idle instead of retrying forever.
    eventually("batch consumed despite write failure", || {
        let catalog = catalog.clone();
        let api = api.clone();
        async move {
            catalog.stats().await.discovered == 0
                && api.detail_batches.lock().unwrap().len() == 1
        }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown_tx.send(true).unwrap();
    batch_task.await.unwrap();

    assert_eq!(store.len(), 0);
    assert_eq!(*api.detail_batches.lock().unwrap(), vec![2]);
}
