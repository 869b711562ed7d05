//! Per-request access log and request metrics.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};

use crate::auth::Identity;
use crate::http::request::RequestIdExt;
use crate::http::response::MatchedRoute;
use crate::observability::metrics;

const UNMATCHED: &str = "unmatched";

/// Emit one structured event per request, levelled by status class.
pub async fn access_log(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request.request_id().unwrap_or_default().to_string();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();
    let route = response
        .extensions()
        .get::<MatchedRoute>()
        .map_or(UNMATCHED, |r| r.0.as_str());
    let user_id = response
        .extensions()
        .get::<Identity>()
        .map(|identity| identity.subject.as_str());
    let latency_ms = latency.as_millis() as u64;
    let ip = peer.ip();

    macro_rules! log_at {
        ($level:ident, $msg:literal) => {
            tracing::$level!(
                method = %method,
                path = %path,
                status,
                latency_ms,
                ip = %ip,
                request_id = %request_id,
                route,
                user_id,
                $msg
            )
        };
    }
    match status {
        500.. => log_at!(error, "Request failed"),
        400..=499 => log_at!(warn, "Request rejected"),
        _ => log_at!(info, "Request completed"),
    }

    metrics::record_request(route, status, latency);
    response
}
