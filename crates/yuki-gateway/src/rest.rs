//! HTTP endpoint provisioning with rate-limit awareness.
//!
//! Every control-plane request flows through a [`RequestGate`] that
//! mirrors the server's per-bucket rate-limit headers and sheds load
//! locally before the server would reject it.

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;

use chrono::Utc;
use reqwest::header::{self, HeaderMap};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::provision::{GatewayEndpoint, GatewayRequest, ProvisionError, Provisioner};

/// Rate-limit bucket the endpoint request is accounted against.
const GATEWAY_BUCKET: &str = "gateway/index";

/// Below this many remaining requests the gate starts shedding.
const LOW_WATER_REMAINING: u32 = 10;

/// Probability a request is shed while the bucket is near exhaustion.
const SHED_PROBABILITY: f64 = 0.5;

/// One observation of the server's rate-limit headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitIndication {
    /// Total requests allowed in the window.
    pub limit: u32,
    /// Requests remaining in the window.
    pub remaining: u32,
    /// Seconds until the window resets.
    pub reset_after_secs: u64,
    /// Bucket the server accounted the request against.
    pub bucket: String,
    /// Whether the global limit tripped.
    pub global: bool,
}

/// Local mirror of the server's rate-limit state.
///
/// Admission happens before a request goes out; the response headers
/// are recorded afterwards. A tripped global limit blocks every bucket
/// until its reset instant.
#[derive(Debug, Default)]
pub struct RequestGate {
    buckets: HashMap<String, RateLimitIndication>,
    disabled_until_millis: i64,
}

impl RequestGate {
    /// Create an empty gate; everything is admitted until headers are
    /// recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a request against `bucket` may go out now.
    pub fn admit(&self, bucket: &str, now_millis: i64) -> Result<(), ProvisionError> {
        self.admit_with_roll(bucket, now_millis, rand::random())
    }

    fn admit_with_roll(
        &self,
        bucket: &str,
        now_millis: i64,
        roll: f64,
    ) -> Result<(), ProvisionError> {
        if now_millis < self.disabled_until_millis {
            return Err(ProvisionError::RateLimited(format!(
                "globally rate limited for another {}ms",
                self.disabled_until_millis - now_millis
            )));
        }
        if let Some(indication) = self.buckets.get(bucket) {
            if indication.remaining < LOW_WATER_REMAINING && roll < SHED_PROBABILITY {
                return Err(ProvisionError::RateLimited(format!(
                    "bucket {bucket} near exhaustion ({} remaining)",
                    indication.remaining
                )));
            }
        }
        Ok(())
    }

    /// Record the rate-limit headers of a completed request.
    ///
    /// The reported bucket must match the requested one (containment
    /// in either direction is accepted, the server abbreviates some
    /// bucket names); a mismatch means the local accounting can no
    /// longer be trusted and is fatal.
    pub fn record(
        &mut self,
        expected_bucket: &str,
        indication: RateLimitIndication,
        now_millis: i64,
    ) -> Result<(), ProvisionError> {
        let reported = indication.bucket.as_str();
        if !reported.contains(expected_bucket) && !expected_bucket.contains(reported) {
            return Err(ProvisionError::Protocol(format!(
                "rate limit bucket mismatch: requested {expected_bucket}, reported {reported}"
            )));
        }
        if indication.global {
            let reset_millis = i64::try_from(indication.reset_after_secs)
                .unwrap_or(i64::MAX)
                .saturating_mul(1000);
            self.disabled_until_millis = now_millis.saturating_add(reset_millis);
            warn!(
                reset_after_secs = indication.reset_after_secs,
                "global rate limit tripped, blocking all requests"
            );
        }
        self.buckets.insert(indication.bucket.clone(), indication);
        Ok(())
    }
}

/// Structured body wrapper of every control-plane response.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct GatewayData {
    url: String,
}

fn header_value<T: FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Extract the rate-limit headers, if the full set is present.
fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitIndication> {
    let limit = header_value(headers, "X-Rate-Limit-Limit")?;
    let remaining = header_value(headers, "X-Rate-Limit-Remaining")?;
    let reset_after_secs = header_value(headers, "X-Rate-Limit-Reset")?;
    let bucket = headers.get("X-Rate-Limit-Bucket")?.to_str().ok()?.to_string();
    let global = headers.contains_key("X-Rate-Limit-Global");
    Some(RateLimitIndication {
        limit,
        remaining,
        reset_after_secs,
        bucket,
        global,
    })
}

/// Production [`Provisioner`] over the platform's HTTP API.
#[derive(Debug)]
pub struct RestProvisioner {
    http: reqwest::Client,
    base_url: String,
    token: String,
    gate: Mutex<RequestGate>,
}

impl RestProvisioner {
    /// Create a provisioner against `base_url` (the `/api/v3` root)
    /// authenticating with `token`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.into(),
            gate: Mutex::new(RequestGate::new()),
        }
    }
}

impl Provisioner for RestProvisioner {
    fn open_gateway(
        &self,
        request: GatewayRequest,
    ) -> impl Future<Output = Result<GatewayEndpoint, ProvisionError>> + Send {
        async move {
            {
                let gate = self.gate.lock().await;
                gate.admit(GATEWAY_BUCKET, Utc::now().timestamp_millis())?;
            }

            let mut query: Vec<(&str, String)> =
                vec![("compress", u8::from(request.compress).to_string())];
            if request.from_disconnect {
                query.push(("resume", "1".to_string()));
                query.push(("sn", request.last_sn.to_string()));
                query.push(("session_id", request.session_id.clone()));
            }

            let url = format!("{}/{GATEWAY_BUCKET}", self.base_url);
            debug!(%url, resume = request.from_disconnect, "requesting gateway endpoint");
            let response = self
                .http
                .get(&url)
                .header(header::AUTHORIZATION, format!("Bot {}", self.token))
                .query(&query)
                .send()
                .await
                .map_err(|e| ProvisionError::Transient(format!("request failed: {e}")))?;

            let status = response.status();
            if let Some(indication) = parse_rate_limit(response.headers()) {
                let mut gate = self.gate.lock().await;
                gate.record(GATEWAY_BUCKET, indication, Utc::now().timestamp_millis())?;
            }
            if !status.is_success() {
                return Err(ProvisionError::Transient(format!("http status {status}")));
            }

            let body: ApiEnvelope<GatewayData> = response
                .json()
                .await
                .map_err(|e| ProvisionError::Protocol(format!("unparseable gateway response: {e}")))?;
            if body.code != 0 {
                return Err(ProvisionError::Transient(format!(
                    "gateway request rejected: code {} ({})",
                    body.code, body.message
                )));
            }
            Ok(GatewayEndpoint { url: body.data.url })
        }
    }
}
