//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (assign/propagate X-Request-ID)
//!     → security headers + CORS
//!     → access_log.rs (one event per request, metrics)
//!     → server.rs (dispatch: route → rate limit → auth → target)
//!     → local.rs (healthcheck, logout) or proxy forwarder
//!     → response.rs (gateway-generated errors)
//!     → Send to client
//! ```

pub mod access_log;
pub mod local;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{json_error, ErrorBody};
pub use server::{AppState, BuildError, GatewayServer};
