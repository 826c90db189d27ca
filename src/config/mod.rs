//! Configuration management for the matchwatch spider
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. A single `Config` is constructed at startup and
//! passed by reference into the API client, catalog, and spider; there is no
//! module-level global state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::GameMode;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote API credentials
    pub credentials: Credentials,

    /// Remote API configuration
    pub api: ApiConfig,

    /// Spider pipeline configuration
    pub spider: SpiderConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Developer credentials for the remote API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Developer id issued by the remote
    pub dev_id: String,

    /// Authentication key used for request signatures
    pub auth_key: String,
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the telemetry service
    pub base_url: String,

    /// Gameplay queue to harvest
    pub mode: GameMode,

    /// Daily request budget, including safety margin
    pub requests_per_day: u64,

    /// Daily session-creation cap
    pub sessions_per_day: u64,

    /// Concurrent session cap
    pub concurrent_sessions: u64,

    /// Session time-to-live in seconds
    pub session_ttl_secs: u64,

    /// Polite pacing limit (requests per second)
    pub requests_per_second: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Spider pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpiderConfig {
    /// Number of sessions, each backed by one bucket worker and one batch worker
    pub sessions: usize,

    /// Match-detail batch size (remote accepts at most 25)
    pub batch_size: usize,

    /// Seconds between durable snapshots
    pub snapshot_interval_secs: u64,

    /// Seconds between catalog regenerations
    pub regenerate_interval_secs: u64,

    /// Seconds between evictions of stale completed buckets
    pub evict_interval_secs: u64,

    /// Idle wait when queues are empty, in seconds
    pub idle_wait_secs: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,

    /// Directory for catalog snapshots
    pub snapshot_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Credentials are mandatory (`MATCHWATCH_DEV_ID`, `MATCHWATCH_AUTH_KEY`);
    /// everything else falls back to defaults.
    pub fn from_env() -> Result<Self> {
        let dev_id = std::env::var("MATCHWATCH_DEV_ID")
            .context("MATCHWATCH_DEV_ID must be set (developer id for the remote API)")?;
        let auth_key = std::env::var("MATCHWATCH_AUTH_KEY")
            .context("MATCHWATCH_AUTH_KEY must be set (auth key for request signatures)")?;

        let mut config = Self {
            credentials: Credentials { dev_id, auth_key },
            ..Self::default()
        };

        if let Ok(url) = std::env::var("MATCHWATCH_API_URL") {
            config.api.base_url = url;
        }
        if let Some(sessions) = env_parse::<usize>("MATCHWATCH_SESSIONS") {
            config.spider.sessions = sessions;
        }
        if let Some(rpd) = env_parse::<u64>("MATCHWATCH_REQUESTS_PER_DAY") {
            config.api.requests_per_day = rpd;
        }
        if let Ok(path) = std::env::var("MATCHWATCH_SQLITE_PATH") {
            config.storage.sqlite_path = path.into();
        }
        if let Ok(dir) = std::env::var("MATCHWATCH_SNAPSHOT_DIR") {
            config.storage.snapshot_dir = dir.into();
        }
        if let Ok(level) = std::env::var("MATCHWATCH_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("MATCHWATCH_LOG_FORMAT") {
            config.logging.format = format;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.credentials.dev_id.is_empty() {
            anyhow::bail!("credentials.dev_id must not be empty");
        }

        if self.credentials.auth_key.is_empty() {
            anyhow::bail!("credentials.auth_key must not be empty");
        }

        if self.spider.sessions == 0 {
            anyhow::bail!("spider.sessions must be greater than 0");
        }

        if self.spider.batch_size == 0 || self.spider.batch_size > 25 {
            anyhow::bail!("spider.batch_size must be between 1 and 25");
        }

        if self.api.requests_per_day == 0 {
            anyhow::bail!("api.requests_per_day must be greater than 0");
        }

        if self.spider.sessions as u64 > self.api.concurrent_sessions {
            anyhow::bail!("spider.sessions must not exceed api.concurrent_sessions");
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    /// Get session TTL as Duration
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.api.session_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials {
                dev_id: String::new(),
                auth_key: String::new(),
            },
            api: ApiConfig {
                base_url: String::from("https://api.paladins.com/paladinsapi.svc"),
                mode: GameMode::Siege,
                // Remote allows 7500/day; keep the same margin the budget
                // accounting has always used.
                requests_per_day: 7500 - 48,
                sessions_per_day: 500,
                concurrent_sessions: 45,
                session_ttl_secs: 15 * 60,
                requests_per_second: 5,
                request_timeout_secs: 30,
            },
            spider: SpiderConfig {
                sessions: 1,
                batch_size: 25,
                snapshot_interval_secs: 600,
                regenerate_interval_secs: 60,
                evict_interval_secs: 24 * 3600,
                idle_wait_secs: 60,
            },
            storage: StorageConfig {
                sqlite_path: PathBuf::from("data/matches.db"),
                snapshot_dir: PathBuf::from("data/catalog"),
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
