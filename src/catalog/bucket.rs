//! Time buckets and bucket generation
//!
//! A bucket is a fixed-width time slice (calendar day + hour + ten-minute
//! sub-slot) treated as one unit of crawl work. The generators here are pure
//! functions of a supplied `now`, which keeps them testable with a fixed clock.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ten-minute sub-slots per hour
pub const SLOTS_PER_HOUR: u8 = 6;

/// How many days back the rolling window reaches
pub const HISTORY_DAYS: i64 = 31;

/// Completed buckets older than this are evicted
pub const RETENTION_DAYS: i64 = 32;

/// Failures after which a bucket is permanently abandoned
pub const MAX_FAILS: u32 = 5;

/// Identity of one time bucket: day, hour, ten-minute sub-slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub date: NaiveDate,
    /// Hour of day, 0..24
    pub hour: u8,
    /// Ten-minute sub-slot, 0..6 (slot n covers minutes n*10 .. n*10+10)
    pub slot: u8,
}

impl BucketKey {
    pub fn new(date: NaiveDate, hour: u8, slot: u8) -> Self {
        debug_assert!(hour < 24 && slot < SLOTS_PER_HOUR);
        Self { date, hour, slot }
    }

    /// Date/hour segment pair as the remote API expects them
    /// (`YYYYMMDD` and `HH,MM`).
    pub fn api_segments(&self) -> (String, String) {
        (
            self.date.format("%Y%m%d").to_string(),
            format!("{:02},{:02}", self.hour, self.slot * 10),
        )
    }

    /// Age of the bucket relative to `now`, by calendar day.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now.date_naive() - self.date).num_days()
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{:02},{:02}",
            self.date.format("%Y%m%d"),
            self.hour,
            self.slot * 10
        )
    }
}

/// One unit of crawl work: a bucket key plus its failure count.
///
/// `fail_count` survives pending/in-flight cycles; once it reaches
/// [`MAX_FAILS`] the bucket is dropped from the catalog entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub key: BucketKey,
    pub fail_count: u32,
}

impl TimeBucket {
    pub fn new(key: BucketKey) -> Self {
        Self { key, fail_count: 0 }
    }

    /// Whether this bucket has exhausted its retry budget
    pub fn is_abandoned(&self) -> bool {
        self.fail_count >= MAX_FAILS
    }
}

/// Every bucket of the last [`HISTORY_DAYS`] full days, chronological.
///
/// Today is excluded; [`today_buckets`] covers it.
pub fn historical_buckets(now: DateTime<Utc>) -> impl Iterator<Item = BucketKey> {
    let first_day = now.date_naive() - Duration::days(HISTORY_DAYS);
    (0..HISTORY_DAYS).flat_map(move |offset| {
        let date = first_day + Duration::days(offset);
        (0..24u8).flat_map(move |hour| {
            (0..SLOTS_PER_HOUR).map(move |slot| BucketKey::new(date, hour, slot))
        })
    })
}

/// Every fully elapsed bucket of the current day, chronological.
///
/// All slots of fully elapsed hours, then, for the current hour, only
/// sub-slots whose ten-minute window has completely passed.
pub fn today_buckets(now: DateTime<Utc>) -> impl Iterator<Item = BucketKey> {
    let date = now.date_naive();
    let current_hour = now.hour() as u8;
    let minute = now.minute() as u8;

    let full_hours = (0..current_hour).flat_map(move |hour| {
        (0..SLOTS_PER_HOUR).map(move |slot| BucketKey::new(date, hour, slot))
    });

    let partial_hour = (0..SLOTS_PER_HOUR)
        .filter(move |slot| minute >= (slot + 1) * 10)
        .map(move |slot| BucketKey::new(date, current_hour, slot));

    full_hours.chain(partial_hour)
}
