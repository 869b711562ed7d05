//! Upstream targets.
//!
//! A target is parsed once at startup from a base URL; requests are
//! rewritten onto it by joining the base path with the inbound path.

use std::fmt;

use axum::http::uri::{Authority, PathAndQuery, Scheme, Uri};
use thiserror::Error;
use url::Url;

/// Error type for upstream base URLs.
#[derive(Debug, Error)]
pub enum UpstreamTargetError {
    #[error("{0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported scheme '{0}' (only http is forwarded)")]
    UnsupportedScheme(String),

    #[error("missing host")]
    MissingHost,

    #[error("invalid authority: {0}")]
    Authority(#[from] axum::http::uri::InvalidUri),
}

/// An internal service the gateway forwards to.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    name: String,
    authority: Authority,
    base_path: String,
}

impl UpstreamTarget {
    /// Parse a base URL such as `http://templates:8082` or `http://pdf/api`.
    pub fn parse(name: impl Into<String>, raw: &str) -> Result<Self, UpstreamTargetError> {
        let url = Url::parse(raw)?;
        if url.scheme() != "http" {
            return Err(UpstreamTargetError::UnsupportedScheme(url.scheme().to_string()));
        }
        let host = url.host_str().ok_or(UpstreamTargetError::MissingHost)?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            name: name.into(),
            authority: authority.parse()?,
            base_path: url.path().trim_end_matches('/').to_string(),
        })
    }

    /// Logical name used in logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Build the upstream URI for an inbound path and query.
    pub fn uri_for(&self, path_and_query: Option<&PathAndQuery>) -> Result<Uri, axum::http::Error> {
        let (path, query) = match path_and_query {
            Some(pq) => (pq.path(), pq.query()),
            None => ("/", None),
        };

        let mut joined = join_paths(&self.base_path, path);
        if let Some(query) = query {
            joined.push('?');
            joined.push_str(query);
        }

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(joined)
            .build()
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}{}", self.authority, self.base_path)
    }
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.is_empty(), path.starts_with('/')) {
        (true, true) => path.to_string(),
        (true, false) => format!("/{path}"),
        (false, true) => format!("{base}{path}"),
        (false, false) => format!("{base}/{path}"),
    }
}
