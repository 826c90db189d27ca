//! The crawl catalog: durable record of bucket and match-ID work
//!
//! [`WorkCatalog`] is the single hand-off point between the bucket-resolution
//! workers, the batch-detail workers, and the maintenance loops. It behaves
//! as a monitor: every public operation is atomic with respect to every
//! other, so compound check-then-mutate sequences (membership check plus
//! enqueue, dequeue plus fail-count check) cannot interleave.
//!
//! A bucket key lives in exactly one of {pending, in-flight, completed} at
//! any instant, and in none of them only once it has been abandoned or
//! evicted.

pub mod bucket;
pub mod snapshot;

pub use bucket::{
    historical_buckets, today_buckets, BucketKey, TimeBucket, HISTORY_DAYS, MAX_FAILS,
    RETENTION_DAYS,
};
pub use snapshot::SnapshotStore;

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

use crate::error::Result;
use crate::models::MatchId;

/// Snapshot document holding the discovered-ID queue
const DOC_DISCOVERED: &str = "discovered";

/// Snapshot document holding the completed-bucket set
const DOC_COMPLETED: &str = "completed";

/// Priority assigned to requeued buckets so retries are served next
const RETRY_PRIORITY: u64 = 0;

/// Entry in the pending queue.
///
/// Ordering is `(priority, seq)`, both monotonically increasing counters
/// assigned under the catalog lock. Bucket dates never participate: two
/// buckets enqueued the same day must still have a total order, and retries
/// (priority 0) must come first regardless of age.
struct PendingEntry {
    priority: u64,
    seq: u64,
    bucket: TimeBucket,
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap serves the lowest (priority, seq) first.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct CatalogState {
    completed: HashSet<BucketKey>,
    in_flight: HashSet<BucketKey>,
    pending: BinaryHeap<PendingEntry>,
    /// Keys dropped at the abandon threshold; kept so `regenerate` cannot
    /// resurrect them. Not persisted, so a restart grants a fresh retry
    /// budget.
    abandoned: HashSet<BucketKey>,
    discovered: VecDeque<MatchId>,
    next_priority: u64,
    next_seq: u64,
}

impl CatalogState {
    fn new() -> Self {
        Self {
            completed: HashSet::new(),
            in_flight: HashSet::new(),
            pending: BinaryHeap::new(),
            abandoned: HashSet::new(),
            discovered: VecDeque::new(),
            next_priority: 1,
            next_seq: 0,
        }
    }

    /// Membership across every bucket set. The pending scan is O(n), an
    /// accepted cost at ~4500 buckets for the full window.
    fn knows(&self, key: &BucketKey) -> bool {
        self.completed.contains(key)
            || self.in_flight.contains(key)
            || self.abandoned.contains(key)
            || self.pending.iter().any(|e| e.bucket.key == *key)
    }

    fn enqueue_new(&mut self, key: BucketKey) {
        let priority = self.next_priority;
        self.next_priority += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(PendingEntry {
            priority,
            seq,
            bucket: TimeBucket::new(key),
        });
    }

    fn enqueue_retry(&mut self, bucket: TimeBucket) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(PendingEntry {
            priority: RETRY_PRIORITY,
            seq,
            bucket,
        });
    }
}

/// Point-in-time counts for logging and the status command
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogStats {
    pub completed: usize,
    pub in_flight: usize,
    pub pending: usize,
    pub discovered: usize,
}

/// Shared crawl catalog, safe for concurrent workers and maintenance loops.
pub struct WorkCatalog {
    state: Mutex<CatalogState>,
    bucket_ready: Notify,
}

impl Default for WorkCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkCatalog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CatalogState::new()),
            bucket_ready: Notify::new(),
        }
    }

    /// Restore completed buckets and discovered IDs from disk.
    ///
    /// In-flight and pending state is deliberately not persisted: buckets
    /// that were mid-resolution at crash time stay unmarked and the next
    /// `regenerate` re-enqueues them. Eviction runs immediately so stale
    /// completed entries never resurrect.
    pub async fn load_state(&self, snapshots: &SnapshotStore, now: DateTime<Utc>) {
        let discovered: Vec<MatchId> = snapshots.load(DOC_DISCOVERED).unwrap_or_default();
        let completed: Vec<BucketKey> = snapshots.load(DOC_COMPLETED).unwrap_or_default();

        {
            let mut state = self.state.lock().await;
            state.discovered = discovered.into();
            state.completed = completed.into_iter().collect();
        }
        self.evict_old(now).await;

        let stats = self.stats().await;
        tracing::info!(
            completed = stats.completed,
            discovered = stats.discovered,
            "catalog state restored"
        );
    }

    /// Write both snapshot documents.
    ///
    /// Discovered IDs are saved before the completed set: a lost ID can only
    /// be regenerated by re-resolving its bucket, whereas a lost completed
    /// mark merely costs duplicate work.
    pub async fn save_state(&self, snapshots: &SnapshotStore) -> Result<()> {
        let (discovered, completed) = {
            let state = self.state.lock().await;
            let discovered: Vec<MatchId> = state.discovered.iter().cloned().collect();
            let completed: Vec<BucketKey> = state.completed.iter().copied().collect();
            (discovered, completed)
        };

        snapshots.save(DOC_DISCOVERED, &discovered).await?;
        snapshots.save(DOC_COMPLETED, &completed).await?;
        Ok(())
    }

    /// Run both bucket generators and enqueue every bucket the catalog does
    /// not already know. Returns the number of buckets enqueued.
    ///
    /// The full window is scanned every time. Restored state is sparse (only
    /// completed buckets survive a restart), so stopping at the first known
    /// key would strand everything generated after it.
    pub async fn regenerate(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.lock().await;
        let mut added = 0;

        for key in historical_buckets(now).chain(today_buckets(now)) {
            if state.knows(&key) {
                continue;
            }
            state.enqueue_new(key);
            added += 1;
        }

        drop(state);
        if added > 0 {
            tracing::debug!(added, "regenerated pending buckets");
            self.bucket_ready.notify_waiters();
        }
        added
    }

    /// Claim the highest-priority pending bucket, waiting up to `timeout`.
    ///
    /// Buckets that already reached the abandon threshold are dropped here,
    /// permanently: they leave the pending queue, and their key is remembered
    /// so regeneration cannot enqueue them again.
    pub async fn claim_bucket(&self, timeout: Duration) -> Option<TimeBucket> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Registered (enabled) before the queue check so a notify landing
            // between the check and the wait cannot be lost.
            let notified = self.bucket_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                while let Some(entry) = state.pending.pop() {
                    if entry.bucket.is_abandoned() {
                        tracing::error!(
                            bucket = %entry.bucket.key,
                            fails = entry.bucket.fail_count,
                            "abandoning bucket after repeated failures"
                        );
                        state.abandoned.insert(entry.bucket.key);
                        continue;
                    }
                    state.in_flight.insert(entry.bucket.key);
                    return Some(entry.bucket);
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return None,
            }
        }
    }

    /// Mark an in-flight bucket fully resolved
    pub async fn complete_bucket(&self, bucket: &TimeBucket) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&bucket.key);
        state.completed.insert(bucket.key);
    }

    /// Return a failed bucket to the queue at retry priority
    pub async fn requeue_bucket(&self, mut bucket: TimeBucket) {
        bucket.fail_count += 1;
        {
            let mut state = self.state.lock().await;
            state.in_flight.remove(&bucket.key);
            state.enqueue_retry(bucket);
        }
        self.bucket_ready.notify_waiters();
    }

    /// Append discovered match IDs to the detail-fetch queue
    pub async fn push_ids(&self, ids: Vec<MatchId>) {
        if ids.is_empty() {
            return;
        }
        let mut state = self.state.lock().await;
        state.discovered.extend(ids);
    }

    /// Take up to `max` IDs from the head of the detail-fetch queue
    pub async fn claim_id_batch(&self, max: usize) -> Vec<MatchId> {
        let mut state = self.state.lock().await;
        let take = max.min(state.discovered.len());
        state.discovered.drain(..take).collect()
    }

    /// Drop completed and abandoned entries older than the retention window
    pub async fn evict_old(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        let before = state.completed.len();
        state.completed.retain(|key| key.age_days(now) <= RETENTION_DAYS);
        state.abandoned.retain(|key| key.age_days(now) <= RETENTION_DAYS);
        let evicted = before - state.completed.len();
        if evicted > 0 {
            tracing::info!(evicted, "evicted stale completed buckets");
        }
    }

    /// Whether a bucket key is marked completed
    pub async fn is_completed(&self, key: &BucketKey) -> bool {
        self.state.lock().await.completed.contains(key)
    }

    /// Current queue and set sizes
    pub async fn stats(&self) -> CatalogStats {
        let state = self.state.lock().await;
        CatalogStats {
            completed: state.completed.len(),
            in_flight: state.in_flight.len(),
            pending: state.pending.len(),
            discovered: state.discovered.len(),
        }
    }
}
