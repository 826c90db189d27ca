//! matchwatch - quota-aware match telemetry spider
//!
//! Continuously harvests player-match records from a quota-limited remote
//! telemetry API. Crawl work is organized as fixed-width time buckets; newly
//! discovered match IDs feed a batched detail-fetch-and-store pipeline. The
//! catalog survives restarts through durable snapshots, and a shared quota
//! manager keeps every worker inside the remote's daily request budget.
//!
//! # Architecture
//!
//! - [`config`] - Configuration loading and validation
//! - [`api`] - Remote API client, sessions, and quota enforcement
//! - [`catalog`] - Time buckets, the work catalog, durable snapshots
//! - [`spider`] - Worker loops and process lifecycle
//! - [`storage`] - Match record persistence (SQLite)
//! - [`models`] - Core data structures
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use matchwatch::api::{ApiClient, QuotaCaps, QuotaManager};
//! use matchwatch::config::Config;
//! use matchwatch::spider::Spider;
//! use matchwatch::storage::SqliteMatchStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let quota = Arc::new(QuotaManager::new(QuotaCaps::from(&config.api)));
//!     let api = Arc::new(ApiClient::new(
//!         &config.api,
//!         config.credentials.clone(),
//!         quota.clone(),
//!     )?);
//!     let store = Arc::new(SqliteMatchStore::new(&config.storage.sqlite_path)?);
//!     Spider::new(config, api, store, quota)?.run().await?;
//!     Ok(())
//! }
//! ```

// Large serde_json literals in tests exceed the default macro depth.
#![recursion_limit = "256"]

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod spider;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{ApiClient, QuotaCaps, QuotaManager, SessionHandle, TelemetryApi};
    pub use crate::catalog::{BucketKey, TimeBucket, WorkCatalog};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::{GameMode, MatchId, MatchRecord};
    pub use crate::spider::Spider;
    pub use crate::storage::{MatchStore, SqliteMatchStore};
}

// Direct re-exports for convenience
pub use models::{GameMode, MatchId, MatchRecord};
