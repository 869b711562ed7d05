//! Cross-cutting HTTP hardening.
//!
//! # Responsibilities
//! - CORS for the single configured frontend origin, with credentials
//! - Standard security response headers on every response
//!
//! # Design Decisions
//! - Both stages are stock tower-http layers wrapped around the pipeline;
//!   they run before routing and never see the auth decision
//! - Security headers are only added when the upstream did not set them
//! - The origin must be a single `scheme://host[:port]`; credentials rule
//!   out `*`, and tower-http panics if it is combined with them

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use thiserror::Error;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
};
use url::Url;

use crate::config::CorsConfig;

const SECURITY_HEADERS: [(HeaderName, &str); 11] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
    (header::REFERRER_POLICY, "no-referrer"),
    (header::X_XSS_PROTECTION, "0"),
    (header::X_DNS_PREFETCH_CONTROL, "off"),
    (HeaderName::from_static("cross-origin-embedder-policy"), "require-corp"),
    (HeaderName::from_static("cross-origin-opener-policy"), "same-origin"),
    (HeaderName::from_static("cross-origin-resource-policy"), "same-origin"),
    (HeaderName::from_static("origin-agent-cluster"), "?1"),
    (HeaderName::from_static("x-download-options"), "noopen"),
    (HeaderName::from_static("x-permitted-cross-domain-policies"), "none"),
];

/// Why a configured CORS origin was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OriginError {
    #[error("wildcard origin cannot be combined with credentials")]
    Wildcard,

    #[error("not a scheme://host[:port] origin: {0}")]
    Malformed(String),
}

/// Parse a configured origin into the exact header value CORS will echo.
pub fn parse_origin(raw: &str) -> Result<HeaderValue, OriginError> {
    let raw = raw.trim();
    if raw == "*" {
        return Err(OriginError::Wildcard);
    }

    let url = Url::parse(raw).map_err(|e| OriginError::Malformed(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(OriginError::Malformed(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(OriginError::Malformed("missing host".into()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(OriginError::Malformed("credentials in origin".into()));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(OriginError::Malformed("origin has a path, query or fragment".into()));
    }

    // Browsers send the origin without a trailing slash.
    let origin = url.origin().ascii_serialization();
    HeaderValue::from_str(&origin).map_err(|e| OriginError::Malformed(e.to_string()))
}

/// CORS policy for the configured frontend origin.
pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, OriginError> {
    let origin = parse_origin(&config.allowed_origin)?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true))
}

/// Wrap `router` with the security response headers.
pub fn with_security_headers(router: Router) -> Router {
    SECURITY_HEADERS
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(
                name,
                HeaderValue::from_static(value),
            ))
        })
}
