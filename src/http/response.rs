//! Response shaping for admission verdicts.
//!
//! # Responsibilities
//! - Attach standard `RateLimit-*` headers to responses under the prefix
//! - Build the 429 response for rejected requests
//!
//! # Design Decisions
//! - Only the standardized header names are sent, no `X-RateLimit-*`
//! - Second values are rounded up so clients never retry too early

use std::time::Duration;

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admission::{Quota, RejectReason};

pub const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Body of a 429 response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectionBody {
    pub error: String,
    pub reason: String,
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

pub fn apply_quota_headers(headers: &mut HeaderMap, quota: &Quota, window: Duration) {
    if let Ok(policy) = HeaderValue::try_from(format!("{};w={}", quota.limit, window.as_secs())) {
        headers.insert(RATELIMIT_POLICY, policy);
    }
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(quota.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(quota.remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(ceil_secs(quota.reset_after)));
}

pub fn rejection_response(
    reason: RejectReason,
    message: &str,
    quota: &Quota,
    window: Duration,
) -> Response {
    let body = RejectionBody {
        error: message.to_string(),
        reason: reason.code().to_string(),
    };
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    apply_quota_headers(headers, quota, window);
    headers.insert(header::RETRY_AFTER, HeaderValue::from(ceil_secs(quota.reset_after)));
    response
}
