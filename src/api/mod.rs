//! Remote telemetry API access
//!
//! [`TelemetryApi`] is the seam between the spider and the remote service:
//! workers and tests talk to the trait, production wires in [`ApiClient`].
//! Every implementation is expected to gate each upstream call on the shared
//! [`QuotaManager`] and surface budget exhaustion as `Error::QuotaExceeded`.

pub mod client;
pub mod quota;
pub mod session;
pub mod signature;

pub use client::ApiClient;
pub use quota::{QuotaCaps, QuotaManager};
pub use session::SessionHandle;

use async_trait::async_trait;

use crate::catalog::BucketKey;
use crate::error::Result;
use crate::models::{DataUsage, GameMode, MatchId, MatchRecord};

/// Capabilities the spider needs from the remote service
#[async_trait]
pub trait TelemetryApi: Send + Sync {
    /// Open a new remote session, returning its id
    async fn create_session(&self) -> Result<String>;

    /// List the match IDs played in one time bucket of the given queue
    async fn list_match_ids(
        &self,
        mode: GameMode,
        bucket: &BucketKey,
        session: &str,
    ) -> Result<Vec<MatchId>>;

    /// Fetch full details for up to 25 matches in one call.
    ///
    /// The batch-size limit is the caller's responsibility; the remote does
    /// not enforce it, it just returns garbage past the limit.
    async fn fetch_match_details(
        &self,
        ids: &[MatchId],
        session: &str,
    ) -> Result<Vec<MatchRecord>>;

    /// Remote-side usage counters, for observability only
    async fn data_usage(&self, session: &str) -> Result<DataUsage>;
}
