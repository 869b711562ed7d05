//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router with the single dispatch handler
//! - Wire up middleware (request ID, tracing, CORS, security headers,
//!   access log, body limit, request timeout)
//! - Run the per-route pipeline: rate limit → auth → forward or local handler
//!
//! # Design Decisions
//! - Routing is done by the gateway's own `RouteTable`, not axum's router,
//!   so resolution order is independent of registration order
//! - Every stage outcome is a terminal HTTP response; nothing panics the task

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::{authenticate, JwtVerifier, TokenVerifier};
use crate::config::GatewayConfig;
use crate::http::access_log::access_log;
use crate::http::local::{healthcheck, logout};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::{not_found, set_rate_limit_headers, too_many_requests, MatchedRoute};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::Forwarder;
use crate::routing::{Route, RouteError, RouteTable, RouteTarget};
use crate::security::headers::{cors_layer, with_security_headers, OriginError};
use crate::security::rate_limit::{BucketKey, Decision, RateLimiter};

/// Error assembling the server from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("invalid CORS origin: {0}")]
    Origin(#[from] OriginError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub limiter: Arc<RateLimiter>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub forwarder: Arc<Forwarder>,
    pub cookie_secure: bool,
}

/// The gateway's HTTP surface, ready to be served.
pub struct GatewayServer {
    router: Router,
    limiter: Arc<RateLimiter>,
    abort: Shutdown,
    sweep_interval: Option<Duration>,
}

impl GatewayServer {
    /// Build the server with the shared-secret JWT verifier.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, BuildError> {
        let verifier = Arc::new(JwtVerifier::new(config.auth.jwt_secret.as_bytes()));
        Self::new(config, verifier)
    }

    /// Build the server with an explicit token verifier.
    pub fn new(config: &GatewayConfig, verifier: Arc<dyn TokenVerifier>) -> Result<Self, BuildError> {
        let routes = Arc::new(RouteTable::from_config(config)?);
        let limiter = Arc::new(RateLimiter::new());
        let abort = Shutdown::new();
        let forwarder = Arc::new(Forwarder::new(&config.timeouts, abort.clone()));

        let state = AppState {
            routes,
            limiter: limiter.clone(),
            verifier,
            forwarder,
            cookie_secure: config.auth.cookie_secure.unwrap_or(false),
        };

        let router = Self::build_router(config, state)?;
        let sweep_interval = config
            .rate_limit
            .enabled
            .then(|| Duration::from_secs(config.rate_limit.sweep_interval_secs));

        Ok(Self {
            router,
            limiter,
            abort,
            sweep_interval,
        })
    }

    /// Build the Axum router with all middleware layers, innermost first.
    fn build_router(config: &GatewayConfig, state: AppState) -> Result<Router, BuildError> {
        let router = Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                config.timeouts.request(),
            ))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(middleware::from_fn(access_log));

        Ok(with_security_headers(router)
            .layer(cors_layer(&config.cors)?)
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer()))
    }

    /// Triggering this cancels every in-flight upstream request.
    pub fn abort_handle(&self) -> Shutdown {
        self.abort.clone()
    }

    /// Start the expired-bucket sweeper, if rate limiting is enabled.
    pub fn spawn_sweeper(&self, stop: Shutdown) -> Option<JoinHandle<()>> {
        self.sweep_interval
            .map(|interval| self.limiter.clone().spawn_sweeper(interval, stop))
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Single entry point for every request.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let Some(route) = state.routes.resolve(request.method(), request.uri().path()) else {
        tracing::debug!(method = %request.method(), path = %request.uri().path(), "No route matched");
        return not_found();
    };

    let mut response = run_pipeline(&state, route, peer, request).await;
    response
        .extensions_mut()
        .insert(MatchedRoute(route.name.clone()));
    response
}

async fn run_pipeline(state: &AppState, route: &Route, peer: SocketAddr, mut request: Request) -> Response {
    let mut quota = None;
    if let Some(rule) = &route.rate_limit {
        let key = BucketKey::new(rule.group.clone(), peer.ip().to_string());
        match state.limiter.admit(key, rule.policy) {
            Decision::Allowed {
                remaining,
                reset_after,
            } => quota = Some((rule.policy.max, remaining, reset_after)),
            Decision::Rejected { retry_after } => {
                tracing::warn!(
                    route = %route.name,
                    group = %rule.group,
                    ip = %peer.ip(),
                    "Rate limit exceeded"
                );
                metrics::record_rate_limited(&rule.group);
                return too_many_requests(retry_after);
            }
        }
    }

    let identity = if route.requires_auth {
        match authenticate(state.verifier.as_ref(), &mut request) {
            Ok(identity) => Some(identity),
            Err(e) => return e.into_response(),
        }
    } else {
        None
    };

    let mut response = match &route.target {
        RouteTarget::Health => healthcheck(),
        RouteTarget::Logout => logout(state.cookie_secure),
        RouteTarget::Upstream(target) => state
            .forwarder
            .forward(request, target, peer)
            .await
            .unwrap_or_else(IntoResponse::into_response),
    };

    if let Some((limit, remaining, reset_after)) = quota {
        set_rate_limit_headers(&mut response, limit, remaining, reset_after);
    }
    if let Some(identity) = identity {
        response.extensions_mut().insert(identity);
    }
    response
}
