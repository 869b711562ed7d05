//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan over routes pre-sorted by specificity; ties keep declaration order
//! - Explicit NoMatch rather than silent default

use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::proxy::upstream::{UpstreamTarget, UpstreamTargetError};
use crate::routing::matcher::{MethodFilter, PathPattern, PatternError};
use crate::security::rate_limit::RateLimitPolicy;

/// Rate-limit group applied to general traffic.
pub const DEFAULT_GROUP: &str = "default";
/// Rate-limit group for the high-volume preview endpoint.
pub const PREVIEW_GROUP: &str = "preview";

/// Error building the route table.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid upstream '{name}': {source}")]
    Upstream {
        name: &'static str,
        #[source]
        source: UpstreamTargetError,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Where a matched request ends up.
#[derive(Debug, Clone)]
pub enum RouteTarget {
    /// Liveness probe answered by the gateway itself.
    Health,
    /// Clears the session cookie.
    Logout,
    Upstream(Arc<UpstreamTarget>),
}

/// Admission rule for a route: a named bucket group and its ceiling.
#[derive(Debug, Clone)]
pub struct RateLimitRule {
    pub group: Arc<str>,
    pub policy: RateLimitPolicy,
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub method: MethodFilter,
    pub pattern: PathPattern,
    pub requires_auth: bool,
    pub rate_limit: Option<RateLimitRule>,
    pub target: RouteTarget,
}

impl Route {
    pub fn new(name: impl Into<String>, pattern: &str, target: RouteTarget) -> Result<Self, PatternError> {
        Ok(Self {
            name: name.into(),
            method: MethodFilter::Any,
            pattern: PathPattern::parse(pattern)?,
            requires_auth: false,
            rate_limit: None,
            target,
        })
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = MethodFilter::Only(method);
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn limited(mut self, rule: Option<RateLimitRule>) -> Self {
        self.rate_limit = rule;
        self
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.matches(method) && self.pattern.matches(path)
    }
}

/// Immutable, specificity-ordered route table.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile routes; resolution order is by pattern rank, then declaration order.
    pub fn new(mut routes: Vec<Route>) -> Self {
        routes.sort_by_key(|route| route.pattern.rank());
        Self { routes }
    }

    /// Build the gateway's route table from configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, RouteError> {
        let upstream = |name: &'static str, raw: &str| {
            UpstreamTarget::parse(name, raw)
                .map(Arc::new)
                .map_err(|source| RouteError::Upstream { name, source })
        };
        let auth = upstream("auth", &config.upstreams.auth)?;
        let templates = upstream("templates", &config.upstreams.templates)?;
        let pdf = upstream("pdf", &config.upstreams.pdf)?;

        let rule = |group: &str, policy: RateLimitPolicy| {
            config.rate_limit.enabled.then(|| RateLimitRule {
                group: Arc::from(group),
                policy,
            })
        };
        let default_limit = rule(DEFAULT_GROUP, config.rate_limit.default.policy());
        let preview_limit = rule(PREVIEW_GROUP, config.rate_limit.preview.policy());

        Ok(Self::new(vec![
            Route::new("healthcheck", "/healthcheck", RouteTarget::Health)?.method(Method::GET),
            Route::new("logout", "/logout", RouteTarget::Logout)?.method(Method::GET),
            Route::new("auth", "/auth/*", RouteTarget::Upstream(auth))?.limited(default_limit.clone()),
            Route::new(
                "template-preview",
                "/templates/{id}/preview",
                RouteTarget::Upstream(templates.clone()),
            )?
            .method(Method::POST)
            .authenticated()
            .limited(preview_limit),
            Route::new("templates", "/templates/*", RouteTarget::Upstream(templates))?
                .authenticated()
                .limited(default_limit.clone()),
            Route::new("pdf", "/pdf/*", RouteTarget::Upstream(pdf))?
                .authenticated()
                .limited(default_limit),
        ]))
    }

    /// Find the route for a request, if any.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(method, path))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
