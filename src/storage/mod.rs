//! Match record persistence
//!
//! The spider writes through the [`MatchStore`] trait so tests can substitute
//! an in-memory fake; production uses [`SqliteMatchStore`]. The contract is
//! idempotent at-least-once: upserts keyed on `(match_id, player_name)`
//! silently skip rows that already exist.

pub mod sqlite;

pub use sqlite::SqliteMatchStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{MatchId, MatchRecord};

/// Storage collaborator for fetched match records
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Whether any record for this match is already stored
    async fn exists(&self, id: &MatchId) -> Result<bool>;

    /// Insert records, ignoring duplicate keys; returns rows actually inserted
    async fn upsert_batch(&self, records: &[MatchRecord]) -> Result<usize>;
}
