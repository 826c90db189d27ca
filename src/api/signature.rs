//! Request signatures for the remote telemetry API
//!
//! Every call carries an MD5 signature of
//! `dev_id + method + auth_key + utc_timestamp`, with the timestamp in
//! `YYYYMMDDHHMMSS` form. The remote compares against its own clock, so the
//! timestamp must be UTC.

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};

/// UTC timestamp in the format the remote expects
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// MD5 signature over dev id, method name, auth key, and timestamp
pub fn signature(dev_id: &str, auth_key: &str, method: &str, timestamp: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(dev_id.as_bytes());
    hasher.update(method.as_bytes());
    hasher.update(auth_key.as_bytes());
    hasher.update(timestamp.as_bytes());
    format!("{:x}", hasher.finalize())
}
