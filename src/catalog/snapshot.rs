//! Durable catalog snapshots
//!
//! Each logical document (completed buckets, discovered IDs) is persisted as
//! a versioned JSON envelope through a fresh-then-final two-file pattern:
//! write the fresh copy, pause briefly, write the final copy. A crash mid-write
//! therefore always leaves at least one fully written prior generation on
//! disk. Readers prefer the final file and fall back to the fresh one; if
//! both are unreadable the caller starts from empty state.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Current snapshot schema version
const SNAPSHOT_VERSION: u32 = 1;

/// Delay between the fresh and final writes
const DEFAULT_WRITE_PAUSE: Duration = Duration::from_millis(250);

/// Versioned envelope around a snapshot payload
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    saved_at: DateTime<Utc>,
    payload: T,
}

/// Writes and reads snapshot documents under a fixed directory.
pub struct SnapshotStore {
    dir: PathBuf,
    write_pause: Duration,
}

impl SnapshotStore {
    /// Create a snapshot store, creating the directory if needed
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_pause: DEFAULT_WRITE_PAUSE,
        })
    }

    /// Override the fresh-to-final write pause (tests use a zero pause)
    pub fn with_write_pause(mut self, pause: Duration) -> Self {
        self.write_pause = pause;
        self
    }

    /// Persist one document through the fresh-then-final pattern
    pub async fn save<T: Serialize>(&self, name: &str, payload: &T) -> Result<()> {
        let envelope = Envelope {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            payload,
        };

        self.write_file(&self.fresh_path(name), &envelope)?;
        tokio::time::sleep(self.write_pause).await;
        self.write_file(&self.final_path(name), &envelope)?;

        tracing::debug!(document = name, "snapshot saved");
        Ok(())
    }

    /// Load one document, preferring the final file over the fresh one.
    ///
    /// Returns `None` when neither generation is readable; a missing snapshot
    /// is normal on first boot, so only an unreadable-but-present file warns.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        match self.read_file(&self.final_path(name)) {
            Ok(Some(payload)) => return Some(payload),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(document = name, error = %e, "final snapshot unreadable, trying fresh");
            }
        }

        match self.read_file(&self.fresh_path(name)) {
            Ok(Some(payload)) => {
                tracing::warn!(document = name, "recovered snapshot from fresh file");
                Some(payload)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(document = name, error = %e, "fresh snapshot unreadable, starting empty");
                None
            }
        }
    }

    fn fresh_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}-fresh.json"))
    }

    fn final_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}-final.json"))
    }

    fn write_file<T: Serialize>(&self, path: &Path, envelope: &Envelope<T>) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| Error::persistence(format!("create {}: {e}", path.display())))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, envelope)
            .map_err(|e| Error::persistence(format!("serialize {}: {e}", path.display())))?;
        Ok(())
    }

    fn read_file<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(path)
            .map_err(|e| Error::persistence(format!("open {}: {e}", path.display())))?;
        let reader = BufReader::new(file);
        let envelope: Envelope<T> = serde_json::from_reader(reader)
            .map_err(|e| Error::persistence(format!("deserialize {}: {e}", path.display())))?;

        if envelope.version != SNAPSHOT_VERSION {
            return Err(Error::persistence(format!(
                "unsupported snapshot version {} in {}",
                envelope.version,
                path.display()
            )));
        }

        Ok(Some(envelope.payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SnapshotStore {
        SnapshotStore::new(dir.path())
            .unwrap()
            .with_write_pause(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let ids = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        store.save("discovered", &ids).await.unwrap();

        let loaded: Vec<String> = store.load("discovered").unwrap();
        assert_eq!(loaded, ids);
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_none() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.load::<Vec<String>>("completed").is_none());
    }

    #[tokio::test]
    async fn test_corrupt_final_falls_back_to_fresh() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let ids = vec!["42".to_string()];
        store.save("discovered", &ids).await.unwrap();

        // Simulate a crash that truncated the final file mid-write.
        fs::write(dir.path().join("discovered-final.json"), b"{\"version\":1,").unwrap();

        let loaded: Vec<String> = store.load("discovered").unwrap();
        assert_eq!(loaded, ids);
    }

    #[tokio::test]
    async fn test_both_corrupt_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        fs::write(dir.path().join("completed-final.json"), b"garbage").unwrap();
        fs::write(dir.path().join("completed-fresh.json"), b"garbage").unwrap();

        assert!(store.load::<Vec<String>>("completed").is_none());
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        fs::write(
            dir.path().join("completed-final.json"),
            br#"{"version":99,"saved_at":"2026-01-01T00:00:00Z","payload":[]}"#,
        )
        .unwrap();

        assert!(store.load::<Vec<String>>("completed").is_none());
    }
}
