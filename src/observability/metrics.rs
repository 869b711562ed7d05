//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route and status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_rate_limited_total` (counter): rejections by limit group
//! - `gateway_upstream_errors_total` (counter): forwarding failures by upstream and kind
//!
//! # Design Decisions
//! - Labels for route, group, upstream, status code
//! - The Prometheus listener is opt-in; without it every recorder call is a no-op

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the global recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(route: &str, status: u16, latency: Duration) {
    counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(latency.as_secs_f64());
}

pub fn record_rate_limited(group: &str) {
    counter!("gateway_rate_limited_total", "group" => group.to_string()).increment(1);
}

pub fn record_upstream_error(upstream: &str, kind: &'static str) {
    counter!(
        "gateway_upstream_errors_total",
        "upstream" => upstream.to_string(),
        "kind" => kind
    )
    .increment(1);
}
