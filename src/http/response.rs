//! Gateway-generated responses.
//!
//! # Responsibilities
//! - Uniform JSON error body `{"error": "<message>"}`
//! - 404 and 429 responses produced by the gateway itself
//! - `X-RateLimit-*` headers on responses admitted by a limit rule
//! - Response extensions consumed by the access log
//!
//! # Design Decisions
//! - Upstream responses never pass through here; they are relayed untouched

use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// JSON error body returned for every gateway-generated failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

pub fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// 429 with `Retry-After` in whole seconds, rounded up.
pub fn too_many_requests(retry_after: Duration) -> Response {
    let mut response = json_error(StatusCode::TOO_MANY_REQUESTS, "too many requests");
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
    response
}

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Advertise the caller's quota. `reset_after` is reported in whole seconds,
/// rounded up.
pub fn set_rate_limit_headers(response: &mut Response, limit: u32, remaining: u32, reset_after: Duration) {
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(retry_after_secs(reset_after)));
}

fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

/// Name of the route that handled a request, attached to the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute(pub String);
