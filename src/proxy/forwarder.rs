//! Reverse-proxy forwarding.
//!
//! # Responsibilities
//! - Rewrite the request onto the upstream target (method, path, query,
//!   headers and body preserved)
//! - Strip hop-by-hop headers in both directions
//! - Own the `X-User-ID` header: only a verified identity may set it
//! - Bound connection establishment and time-to-response-headers
//! - Stream the upstream response back untouched
//!
//! # Design Decisions
//! - No retries: a failed forward resolves to a 5xx for the caller
//! - Dropping the in-flight client future closes the upstream connection,
//!   which is how both deadlines and forced shutdown cancel work
//! - A relayed body is raced against the abort handle too, so a forced stop
//!   also closes upstreams that are still streaming

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header, Extensions, HeaderMap, HeaderName, HeaderValue, StatusCode, Version},
    response::{IntoResponse, Response},
    BoxError,
};
use hyper::body::{Body as HttpBody, Frame, Incoming, SizeHint};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::auth::{Identity, X_USER_ID};
use crate::config::TimeoutConfig;
use crate::http::response::json_error;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::upstream::UpstreamTarget;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// Failure while forwarding to an upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("could not build upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream unreachable: {0}")]
    Connect(#[source] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("upstream request cancelled by shutdown")]
    Cancelled,
}

impl UpstreamError {
    pub fn status(&self) -> StatusCode {
        match self {
            UpstreamError::Request(_) | UpstreamError::Connect(_) => StatusCode::BAD_GATEWAY,
            UpstreamError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            UpstreamError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Request(_) => "request",
            UpstreamError::Connect(e) if e.is_connect() => "connect",
            UpstreamError::Connect(_) => "protocol",
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Cancelled => "cancelled",
        }
    }
}

impl IntoResponse for UpstreamError {
    fn into_response(self) -> Response {
        let message = match self {
            UpstreamError::Timeout(_) => "upstream timed out",
            UpstreamError::Cancelled => "gateway shutting down",
            _ => "upstream unavailable",
        };
        json_error(self.status(), message)
    }
}

/// Relays requests to upstream targets over a pooled HTTP/1.1 client.
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    deadline: Duration,
    abort: Shutdown,
}

impl Forwarder {
    /// `abort` cancels every in-flight forward when triggered.
    pub fn new(timeouts: &TimeoutConfig, abort: Shutdown) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect()));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .build(connector);

        // Connect failures surface through the connector's own timeout; the
        // deadline bounds time to response headers end to end.
        Self {
            client,
            deadline: timeouts.response_header(),
            abort,
        }
    }

    /// Upper bound on time to response headers.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Forward `request` to `target` on behalf of the peer at `client`.
    pub async fn forward(
        &self,
        request: Request,
        target: &UpstreamTarget,
        client: SocketAddr,
    ) -> Result<Response, UpstreamError> {
        let start = Instant::now();
        let (mut parts, body) = request.into_parts();

        let identity = parts.extensions.remove::<Identity>();
        prepare_request_headers(&mut parts.headers, identity.as_ref(), client.ip());
        parts.uri = target.uri_for(parts.uri.path_and_query())?;
        parts.version = Version::HTTP_11;
        parts.extensions = Extensions::new();

        let outbound = Request::from_parts(parts, body);

        let result = tokio::select! {
            biased;
            _ = self.abort.triggered() => Err(UpstreamError::Cancelled),
            res = tokio::time::timeout(self.deadline, self.client.request(outbound)) => match res {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(UpstreamError::Connect(e)),
                Err(_) => Err(UpstreamError::Timeout(self.deadline)),
            },
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(response) => {
                tracing::debug!(
                    upstream = target.name(),
                    status = %response.status(),
                    elapsed_ms,
                    "Upstream responded"
                );
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                let body = AbortableBody::new(body, self.abort.clone());
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Err(e) => {
                tracing::error!(
                    upstream = target.name(),
                    target = %target,
                    elapsed_ms,
                    error = %e,
                    "Upstream request failed"
                );
                metrics::record_upstream_error(target.name(), e.kind());
                Err(e)
            }
        }
    }
}

/// Upstream response body that fails once the abort handle fires.
///
/// Failing drops the upstream `Incoming`, which closes its connection instead
/// of returning it to the pool.
struct AbortableBody {
    inner: Option<Pin<Box<Incoming>>>,
    aborted: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl AbortableBody {
    fn new(inner: Incoming, abort: Shutdown) -> Self {
        Self {
            inner: Some(Box::pin(inner)),
            aborted: Box::pin(async move { abort.triggered().await }),
        }
    }
}

impl HttpBody for AbortableBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        if this.inner.is_none() {
            return Poll::Ready(None);
        }
        if this.aborted.as_mut().poll(cx).is_ready() {
            this.inner = None;
            tracing::debug!("Upstream body cut off by forced shutdown");
            return Poll::Ready(Some(Err(UpstreamError::Cancelled.into())));
        }
        match this.inner.as_mut() {
            Some(inner) => inner.as_mut().poll_frame(cx).map_err(Into::into),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.as_ref().map_or(true, |inner| inner.is_end_stream())
    }

    fn size_hint(&self) -> SizeHint {
        self.inner
            .as_ref()
            .map_or_else(|| SizeHint::with_exact(0), |inner| inner.size_hint())
    }
}

/// Rewrite inbound headers for the upstream hop.
fn prepare_request_headers(headers: &mut HeaderMap, identity: Option<&Identity>, client: IpAddr) {
    let original_host = headers.remove(header::HOST);
    strip_hop_by_hop(headers);

    headers.remove(X_USER_ID);
    if let Some(identity) = identity {
        if let Ok(value) = HeaderValue::from_str(&identity.subject) {
            headers.insert(X_USER_ID, value);
        }
    }

    let forwarded_for = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{prior}, {client}"),
        None => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Some(host) = original_host {
        headers.insert(X_FORWARDED_HOST, host);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}
