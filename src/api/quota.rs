//! Daily request and session budgets
//!
//! The remote enforces hard per-day limits; exceeding them gets the dev key
//! throttled for the rest of the UTC day. [`QuotaManager`] is the single
//! gatekeeper: every upstream call must pass [`QuotaManager::allow_request`]
//! first, and session creation must pass the session caps before the remote
//! call is made, not after.
//!
//! The request counter uses an increment-check-decrement pattern so that
//! under any interleaving of threads the counter never observably exceeds
//! the cap.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// Daily caps imposed by the remote service
#[derive(Debug, Clone, Copy)]
pub struct QuotaCaps {
    pub requests_per_day: u64,
    pub sessions_per_day: u64,
    pub concurrent_sessions: u64,
}

impl From<&ApiConfig> for QuotaCaps {
    fn from(api: &ApiConfig) -> Self {
        Self {
            requests_per_day: api.requests_per_day,
            sessions_per_day: api.sessions_per_day,
            concurrent_sessions: api.concurrent_sessions,
        }
    }
}

/// Shared budget tracker for requests and sessions.
///
/// Counters reset lazily: the first check on a new UTC day zeroes the daily
/// tallies. The active-session count is not daily and only moves via
/// `begin_session` / `end_session`.
pub struct QuotaManager {
    caps: QuotaCaps,
    requests_today: AtomicU64,
    sessions_today: AtomicU64,
    active_sessions: AtomicU64,
    current_day: Mutex<NaiveDate>,
}

impl QuotaManager {
    pub fn new(caps: QuotaCaps) -> Self {
        Self {
            caps,
            requests_today: AtomicU64::new(0),
            sessions_today: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            current_day: Mutex::new(Utc::now().date_naive()),
        }
    }

    /// Reserve one request against the daily budget.
    ///
    /// The increment happens first; if the post-increment value exceeds the
    /// cap the reservation is rolled back and `QuotaExceeded` returned, so
    /// the call this gates never proceeds.
    pub fn allow_request(&self) -> Result<()> {
        self.allow_request_at(Utc::now())
    }

    /// Clock-injectable variant of [`allow_request`](Self::allow_request)
    pub fn allow_request_at(&self, now: DateTime<Utc>) -> Result<()> {
        self.roll_day(now);

        let used = self.requests_today.fetch_add(1, Ordering::SeqCst) + 1;
        if used > self.caps.requests_per_day {
            self.requests_today.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::QuotaExceeded);
        }
        Ok(())
    }

    /// Reserve capacity for one new concurrent session.
    ///
    /// Checks both the concurrent cap and the daily creation cap before the
    /// remote call happens. Must be balanced by [`end_session`](Self::end_session).
    pub fn begin_session(&self) -> Result<()> {
        self.roll_day(Utc::now());

        let active = self.active_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        if active > self.caps.concurrent_sessions {
            self.active_sessions.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::QuotaExceeded);
        }

        if let Err(e) = self.note_session_created() {
            self.active_sessions.fetch_sub(1, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    /// Count a session renewal against the daily creation cap.
    ///
    /// A renewal replaces an existing session, so the concurrent count is
    /// unchanged.
    pub fn note_session_created(&self) -> Result<()> {
        let created = self.sessions_today.fetch_add(1, Ordering::SeqCst) + 1;
        if created > self.caps.sessions_per_day {
            self.sessions_today.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::QuotaExceeded);
        }
        Ok(())
    }

    /// Release one concurrent session slot
    pub fn end_session(&self) {
        self.active_sessions.fetch_sub(1, Ordering::SeqCst);
    }

    /// Requests left in today's budget
    pub fn remaining(&self) -> u64 {
        self.caps
            .requests_per_day
            .saturating_sub(self.requests_today.load(Ordering::SeqCst))
    }

    /// Time until the next UTC midnight, when the remote resets its counters
    pub fn until_reset(&self) -> Duration {
        Self::until_reset_at(Utc::now())
    }

    /// Clock-injectable variant of [`until_reset`](Self::until_reset)
    pub fn until_reset_at(now: DateTime<Utc>) -> Duration {
        let tomorrow = now.date_naive().succ_opt().expect("date overflow");
        let midnight = Utc.from_utc_datetime(&tomorrow.and_hms_opt(0, 0, 0).expect("valid time"));
        (midnight - now).to_std().unwrap_or_default()
    }

    fn roll_day(&self, now: DateTime<Utc>) {
        let today = now.date_naive();
        let mut day = self.current_day.lock().expect("quota day lock poisoned");
        if *day != today {
            *day = today;
            self.requests_today.store(0, Ordering::SeqCst);
            self.sessions_today.store(0, Ordering::SeqCst);
            tracing::info!(day = %today, "daily quota counters reset");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn caps(requests: u64) -> QuotaCaps {
        QuotaCaps {
            requests_per_day: requests,
            sessions_per_day: 5,
            concurrent_sessions: 2,
        }
    }

    #[test]
    fn test_request_budget_hard_stop() {
        let quota = QuotaManager::new(caps(3));

        assert!(quota.allow_request().is_ok());
        assert!(quota.allow_request().is_ok());
        assert_eq!(quota.remaining(), 1);

        // One more reaches the cap exactly.
        assert!(quota.allow_request().is_ok());
        assert_eq!(quota.remaining(), 0);

        // The next is denied and leaves the counter at the cap, not cap+1.
        assert!(matches!(quota.allow_request(), Err(Error::QuotaExceeded)));
        assert_eq!(quota.remaining(), 0);
    }

    #[test]
    fn test_day_rollover_resets_budget() {
        let quota = QuotaManager::new(caps(1));
        let today = Utc::now();

        assert!(quota.allow_request_at(today).is_ok());
        assert!(quota.allow_request_at(today).is_err());

        let tomorrow = today + ChronoDuration::days(1);
        assert!(quota.allow_request_at(tomorrow).is_ok());
    }

    #[test]
    fn test_concurrent_session_cap() {
        let quota = QuotaManager::new(caps(100));

        assert!(quota.begin_session().is_ok());
        assert!(quota.begin_session().is_ok());
        assert!(quota.begin_session().is_err());

        quota.end_session();
        assert!(quota.begin_session().is_ok());
    }

    #[test]
    fn test_daily_session_cap_counts_renewals() {
        let quota = QuotaManager::new(caps(100));

        quota.begin_session().unwrap();
        // 4 renewals exhaust the remaining daily budget of 5.
        for _ in 0..4 {
            quota.note_session_created().unwrap();
        }
        assert!(quota.note_session_created().is_err());
    }

    #[test]
    fn test_until_reset_is_under_a_day() {
        let until = QuotaManager::until_reset_at(Utc::now());
        assert!(until <= Duration::from_secs(24 * 3600));
    }
}
