//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (cookie / Authorization header)
//!     → stage.rs (pick credential, cookie first)
//!     → token.rs (TokenVerifier: signature, algorithm, subject, expiry)
//!     → Identity in request extensions + X-User-ID header
//!     → or 401 {"error": ...}
//! ```

pub mod stage;
pub mod token;

use axum::http::HeaderName;

pub use stage::{authenticate, extract_token, AuthError, CredentialSource, ACCESS_TOKEN_COOKIE};
pub use token::{Identity, JwtVerifier, TokenError, TokenVerifier};

/// Identity header the upstream services trust.
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
