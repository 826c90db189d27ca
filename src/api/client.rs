//! HTTP client for the remote telemetry API
//!
//! Builds the signed per-method URLs the remote expects
//! (`{base}/{method}Json/{dev_id}/{signature}/{session}/{timestamp}`,
//! createsession without the session segment), paces outgoing requests with
//! a governor rate limiter, and gates every call on the shared daily budget.
//! The remote reports budget exhaustion inside otherwise-successful JSON
//! bodies; that is mapped back to `Error::QuotaExceeded` here.

use async_trait::async_trait;
use chrono::Utc;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::Client;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::api::quota::QuotaManager;
use crate::api::signature::{signature, timestamp};
use crate::api::TelemetryApi;
use crate::catalog::BucketKey;
use crate::config::{ApiConfig, Credentials};
use crate::error::{Error, Result};
use crate::models::{DataUsage, GameMode, MatchId, MatchRecord};

/// Response format segment appended to every method name
const RESPONSE_FORMAT: &str = "Json";

/// Largest batch the details endpoint answers coherently
pub const MAX_DETAIL_BATCH: usize = 25;

/// reqwest-backed implementation of [`TelemetryApi`]
pub struct ApiClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    quota: Arc<QuotaManager>,
    pacer: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl ApiClient {
    /// Create a client from API config and the shared quota manager
    pub fn new(
        api: &ApiConfig,
        credentials: Credentials,
        quota: Arc<QuotaManager>,
    ) -> Result<Self> {
        Self::with_base_url(api.base_url.clone(), api, credentials, quota)
    }

    /// Create a client against an explicit base URL (tests use a mock server)
    pub fn with_base_url(
        base_url: String,
        api: &ApiConfig,
        credentials: Credentials,
        quota: Arc<QuotaManager>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(api.request_timeout_secs))
            .gzip(true)
            .build()?;

        let rate = NonZeroU32::new(api.requests_per_second)
            .unwrap_or_else(|| NonZeroU32::new(1).expect("1 is non-zero"));
        let pacer = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            http,
            base_url,
            credentials,
            quota,
            pacer,
        })
    }

    fn method_url(&self, method: &str, session: Option<&str>) -> String {
        let ts = timestamp(Utc::now());
        let sig = signature(&self.credentials.dev_id, &self.credentials.auth_key, method, &ts);

        match session {
            Some(session) => format!(
                "{}/{}{}/{}/{}/{}/{}",
                self.base_url, method, RESPONSE_FORMAT, self.credentials.dev_id, sig, session, ts
            ),
            // createsession is the one method without a session segment.
            None => format!(
                "{}/{}{}/{}/{}/{}",
                self.base_url, method, RESPONSE_FORMAT, self.credentials.dev_id, sig, ts
            ),
        }
    }

    /// Perform one budget-gated, paced GET and parse the JSON body
    async fn request(&self, url: &str) -> Result<Value> {
        self.quota.allow_request()?;
        self.pacer.until_ready().await;

        let response = self.http.get(url).send().await?.error_for_status()?;
        let body: Value = response.json().await?;

        check_remote_limit(&body)?;
        Ok(body)
    }
}

/// The remote signals budget exhaustion in-band via `ret_msg`
fn check_remote_limit(body: &Value) -> Result<()> {
    let msg = match body {
        Value::Array(rows) => rows.first().and_then(|r| r.get("ret_msg")),
        Value::Object(_) => body.get("ret_msg"),
        _ => None,
    };

    if let Some(Value::String(msg)) = msg {
        let lower = msg.to_lowercase();
        if lower.contains("request limit") || lower.contains("daily limit") {
            return Err(Error::QuotaExceeded);
        }
    }
    Ok(())
}

#[async_trait]
impl TelemetryApi for ApiClient {
    async fn create_session(&self) -> Result<String> {
        let url = self.method_url("createsession", None);
        let body = self.request(&url).await?;

        let approved = body
            .get("ret_msg")
            .and_then(Value::as_str)
            .map(|msg| msg == "Approved")
            .unwrap_or(false);
        if !approved {
            let msg = body
                .get("ret_msg")
                .and_then(Value::as_str)
                .unwrap_or("no ret_msg in response")
                .to_string();
            return Err(Error::SessionDenied(msg));
        }

        body.get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::ApiResponse("createsession approved without session_id".into()))
    }

    async fn list_match_ids(
        &self,
        mode: GameMode,
        bucket: &BucketKey,
        session: &str,
    ) -> Result<Vec<MatchId>> {
        let (date, slot) = bucket.api_segments();
        let url = format!(
            "{}/{}/{}/{}",
            self.method_url("getmatchidsbyqueue", Some(session)),
            mode.queue_id(),
            date,
            slot
        );
        let body = self.request(&url).await?;

        let rows = body
            .as_array()
            .ok_or_else(|| Error::ApiResponse("getmatchidsbyqueue: expected an array".into()))?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            match row.get("Match") {
                Some(Value::String(id)) => ids.push(id.clone()),
                Some(Value::Number(id)) => ids.push(id.to_string()),
                _ => {
                    return Err(Error::ApiResponse(
                        "getmatchidsbyqueue: row without Match id".into(),
                    ))
                }
            }
        }
        Ok(ids)
    }

    async fn fetch_match_details(
        &self,
        ids: &[MatchId],
        session: &str,
    ) -> Result<Vec<MatchRecord>> {
        debug_assert!(ids.len() <= MAX_DETAIL_BATCH);

        let url = format!(
            "{}/{}",
            self.method_url("getmatchdetailsbatch", Some(session)),
            ids.join(",")
        );
        let body = self.request(&url).await?;

        serde_json::from_value(body)
            .map_err(|e| Error::ApiResponse(format!("getmatchdetailsbatch: {e}")))
    }

    async fn data_usage(&self, session: &str) -> Result<DataUsage> {
        let url = self.method_url("getdataused", Some(session));
        let body = self.request(&url).await?;

        // The remote wraps the single usage object in a one-element array.
        let usage = match body {
            Value::Array(mut rows) if !rows.is_empty() => rows.remove(0),
            other => other,
        };

        serde_json::from_value(usage).map_err(|e| Error::ApiResponse(format!("getdataused: {e}")))
    }
}
