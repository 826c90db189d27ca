//! SQLite-backed match store
//!
//! Records are keyed on `(match_id, player_name)` and inserted with
//! `ON CONFLICT DO NOTHING`, which is what makes the whole pipeline safe to
//! replay: re-fetching a bucket or a batch only re-inserts rows that are
//! already ignored.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{MatchId, MatchRecord};
use crate::storage::MatchStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS match_details (
    match_id            TEXT NOT NULL,
    player_name         TEXT NOT NULL,
    player_id           TEXT NOT NULL,
    account_level       INTEGER NOT NULL,
    master_level        INTEGER NOT NULL,
    champion            TEXT NOT NULL,
    match_date          TEXT NOT NULL,
    map                 TEXT NOT NULL,
    match_duration      INTEGER NOT NULL,
    platform            TEXT NOT NULL,
    region              TEXT NOT NULL,
    party_id            INTEGER NOT NULL,
    team                INTEGER NOT NULL,
    team1_score         INTEGER NOT NULL,
    team2_score         INTEGER NOT NULL,
    win_status          TEXT NOT NULL,
    kills               INTEGER NOT NULL,
    deaths              INTEGER NOT NULL,
    assists             INTEGER NOT NULL,
    streak              INTEGER NOT NULL,
    highest_multi_kill  INTEGER NOT NULL,
    objective_time      INTEGER NOT NULL,
    damage_dealt        INTEGER NOT NULL,
    damage_taken        INTEGER NOT NULL,
    shielding           INTEGER NOT NULL,
    healing             INTEGER NOT NULL,
    self_healing        INTEGER NOT NULL,
    credits             INTEGER NOT NULL,
    loadout_card1       TEXT NOT NULL,
    loadout_card2       TEXT NOT NULL,
    loadout_card3       TEXT NOT NULL,
    loadout_card4       TEXT NOT NULL,
    loadout_card5       TEXT NOT NULL,
    loadout_card1_level INTEGER NOT NULL,
    loadout_card2_level INTEGER NOT NULL,
    loadout_card3_level INTEGER NOT NULL,
    loadout_card4_level INTEGER NOT NULL,
    loadout_card5_level INTEGER NOT NULL,
    talent              TEXT NOT NULL,
    item1               TEXT NOT NULL,
    item2               TEXT NOT NULL,
    item3               TEXT NOT NULL,
    item4               TEXT NOT NULL,
    item1_level         INTEGER NOT NULL,
    item2_level         INTEGER NOT NULL,
    item3_level         INTEGER NOT NULL,
    item4_level         INTEGER NOT NULL,
    PRIMARY KEY (match_id, player_name)
);
CREATE INDEX IF NOT EXISTS idx_match_details_match_id ON match_details (match_id);
";

const INSERT: &str = "
INSERT INTO match_details (
    match_id, player_name, player_id, account_level, master_level, champion,
    match_date, map, match_duration, platform, region, party_id, team,
    team1_score, team2_score, win_status, kills, deaths, assists, streak,
    highest_multi_kill, objective_time, damage_dealt, damage_taken, shielding,
    healing, self_healing, credits, loadout_card1, loadout_card2,
    loadout_card3, loadout_card4, loadout_card5, loadout_card1_level,
    loadout_card2_level, loadout_card3_level, loadout_card4_level,
    loadout_card5_level, talent, item1, item2, item3, item4, item1_level,
    item2_level, item3_level, item4_level
) VALUES (
    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
    ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30,
    ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38, ?39, ?40, ?41, ?42, ?43, ?44,
    ?45, ?46, ?47
) ON CONFLICT (match_id, player_name) DO NOTHING;
";

/// SQLite implementation of [`MatchStore`]
pub struct SqliteMatchStore {
    conn: Mutex<Connection>,
}

impl SqliteMatchStore {
    /// Open (or create) the database at `path` and ensure the schema exists
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Total stored rows
    pub fn row_count(&self) -> Result<u64> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM match_details", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[async_trait]
impl MatchStore for SqliteMatchStore {
    async fn exists(&self, id: &MatchId) -> Result<bool> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM match_details WHERE match_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn upsert_batch(&self, records: &[MatchRecord]) -> Result<usize> {
        let mut conn = self.conn.lock().expect("store lock poisoned");
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT)?;
            for r in records {
                inserted += stmt.execute(params![
                    r.match_id,
                    r.player_name,
                    r.player_id,
                    r.account_level,
                    r.master_level,
                    r.champion,
                    r.match_date,
                    r.map,
                    r.match_duration,
                    r.platform,
                    r.region,
                    r.party_id,
                    r.team,
                    r.team1_score,
                    r.team2_score,
                    r.win_status,
                    r.kills,
                    r.deaths,
                    r.assists,
                    r.streak,
                    r.highest_multi_kill,
                    r.objective_time,
                    r.damage_dealt,
                    r.damage_taken,
                    r.shielding,
                    r.healing,
                    r.self_healing,
                    r.credits,
                    r.loadout_card1,
                    r.loadout_card2,
                    r.loadout_card3,
                    r.loadout_card4,
                    r.loadout_card5,
                    r.loadout_card1_level,
                    r.loadout_card2_level,
                    r.loadout_card3_level,
                    r.loadout_card4_level,
                    r.loadout_card5_level,
                    r.talent,
                    r.item1,
                    r.item2,
                    r.item3,
                    r.item4,
                    r.item1_level,
                    r.item2_level,
                    r.item3_level,
                    r.item4_level,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(match_id: &str, player: &str) -> MatchRecord {
        MatchRecord {
            match_id: match_id.to_string(),
            player_name: player.to_string(),
            champion: "Androxus".to_string(),
            kills: 12,
            ..MatchRecord::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_and_exists() {
        let store = SqliteMatchStore::in_memory().unwrap();

        assert!(!store.exists(&"m1".to_string()).await.unwrap());

        let inserted = store
            .upsert_batch(&[record("m1", "alice"), record("m1", "bob")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert!(store.exists(&"m1".to_string()).await.unwrap());
        assert!(!store.exists(&"m2".to_string()).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_keys_silently_ignored() {
        let store = SqliteMatchStore::in_memory().unwrap();

        store.upsert_batch(&[record("m1", "alice")]).await.unwrap();

        // Same key again: no error, no new row.
        let inserted = store
            .upsert_batch(&[record("m1", "alice"), record("m1", "carol")])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.row_count().unwrap(), 2);
    }
}
