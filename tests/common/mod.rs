#![allow(dead_code)]

//! Shared test doubles for integration tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use matchwatch::api::TelemetryApi;
use matchwatch::catalog::BucketKey;
use matchwatch::error::{Error, Result};
use matchwatch::models::{DataUsage, GameMode, MatchId, MatchRecord};
use matchwatch::storage::MatchStore;

/// Scripted in-memory stand-in for the remote API.
///
/// Buckets resolve to the IDs registered against them (empty otherwise);
/// details return one minimal record per requested ID. Toggle the fail flags
/// to simulate budget exhaustion.
#[derive(Default)]
pub struct FakeApi {
    bucket_ids: Mutex<HashMap<BucketKey, Vec<MatchId>>>,
    pub sessions_created: AtomicU64,
    pub list_calls: AtomicU64,
    pub listing_quota_exhausted: AtomicBool,
    pub detail_quota_exhausted: AtomicBool,
    /// Batch sizes seen by fetch_match_details, in call order
    pub detail_batches: Mutex<Vec<usize>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_bucket(&self, key: BucketKey, ids: &[&str]) {
        self.bucket_ids
            .lock()
            .unwrap()
            .insert(key, ids.iter().map(|s| s.to_string()).collect());
    }
}

#[async_trait]
impl TelemetryApi for FakeApi {
    async fn create_session(&self) -> Result<String> {
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("fake-session-{n}"))
    }

    async fn list_match_ids(
        &self,
        _mode: GameMode,
        bucket: &BucketKey,
        _session: &str,
    ) -> Result<Vec<MatchId>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.listing_quota_exhausted.load(Ordering::SeqCst) {
            return Err(Error::QuotaExceeded);
        }
        Ok(self
            .bucket_ids
            .lock()
            .unwrap()
            .get(bucket)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_match_details(
        &self,
        ids: &[MatchId],
        _session: &str,
    ) -> Result<Vec<MatchRecord>> {
        if self.detail_quota_exhausted.load(Ordering::SeqCst) {
            return Err(Error::QuotaExceeded);
        }
        self.detail_batches.lock().unwrap().push(ids.len());
        Ok(ids
            .iter()
            .map(|id| MatchRecord {
                match_id: id.clone(),
                player_name: format!("player-{id}"),
                ..MatchRecord::default()
            })
            .collect())
    }

    async fn data_usage(&self, _session: &str) -> Result<DataUsage> {
        Ok(DataUsage::default())
    }
}

/// In-memory match store
#[derive(Default)]
pub struct FakeStore {
    records: Mutex<Vec<MatchRecord>>,
    keys: Mutex<HashSet<MatchId>>,
    pub fail_writes: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a match was stored in an earlier run
    pub fn seed(&self, id: &str) {
        self.keys.lock().unwrap().insert(id.to_string());
    }

    pub fn stored_ids(&self) -> Vec<MatchId> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.match_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl MatchStore for FakeStore {
    async fn exists(&self, id: &MatchId) -> Result<bool> {
        Ok(self.keys.lock().unwrap().contains(id))
    }

    async fn upsert_batch(&self, records: &[MatchRecord]) -> Result<usize> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::persistence("injected store failure"));
        }

        let mut keys = self.keys.lock().unwrap();
        let mut stored = self.records.lock().unwrap();
        let mut inserted = 0;
        for record in records {
            if keys.insert(record.match_id.clone()) {
                stored.push(record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
