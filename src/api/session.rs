//! Session lifecycle for the remote API
//!
//! Sessions are time-bounded credential tokens with a 15-minute TTL. A
//! [`SessionHandle`] owns one logical session for the lifetime of a worker
//! pair and renews it transparently on expiry. Renewal is serialized behind
//! the handle's lock, so concurrent `ensure_live` callers for the same
//! session trigger exactly one renewal.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::api::quota::QuotaManager;
use crate::api::TelemetryApi;
use crate::error::Result;

struct SessionState {
    id: String,
    created: DateTime<Utc>,
}

impl SessionState {
    fn is_live(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = (now - self.created).to_std().unwrap_or_default();
        age < ttl
    }
}

/// One logical remote session with transparent, single-flight renewal.
pub struct SessionHandle {
    api: Arc<dyn TelemetryApi>,
    quota: Arc<QuotaManager>,
    ttl: Duration,
    state: Mutex<SessionState>,
}

impl SessionHandle {
    /// Create a session, reserving a concurrent-session slot first.
    ///
    /// The slot is released again if the remote call fails.
    pub async fn create(
        api: Arc<dyn TelemetryApi>,
        quota: Arc<QuotaManager>,
        ttl: Duration,
    ) -> Result<Self> {
        quota.begin_session()?;

        let id = match api.create_session().await {
            Ok(id) => id,
            Err(e) => {
                quota.end_session();
                return Err(e);
            }
        };

        tracing::info!(session = %id, "remote session created");
        Ok(Self {
            api,
            quota,
            ttl,
            state: Mutex::new(SessionState {
                id,
                created: Utc::now(),
            }),
        })
    }

    /// Return the current session id, renewing it first if the TTL elapsed.
    pub async fn ensure_live(&self) -> Result<String> {
        // Holding the lock across the renewal call is what makes renewal
        // single-flight; late arrivals see the fresh session and return.
        let mut state = self.state.lock().await;
        if state.is_live(self.ttl, Utc::now()) {
            return Ok(state.id.clone());
        }

        self.quota.note_session_created()?;
        let id = self.api.create_session().await?;
        tracing::info!(old = %state.id, new = %id, "session renewed");

        *state = SessionState {
            id: id.clone(),
            created: Utc::now(),
        };
        Ok(id)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.quota.end_session();
    }
}
