//! Authentication stage of the request pipeline.
//!
//! Token extraction order:
//! 1. cookie `access_token`, when present and non-empty; the header is then
//!    ignored even if the cookie fails verification
//! 2. `Authorization: Bearer <token>`
//!
//! On success the identity is stored in the request extensions and the
//! subject is written to `X-User-ID` for the upstream.

use axum::{
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use thiserror::Error;

use crate::auth::token::{Identity, TokenVerifier};
use crate::auth::X_USER_ID;
use crate::http::response::json_error;

/// Session cookie carrying the bearer token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

const BEARER_PREFIX: &str = "Bearer ";

/// Where a credential was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Cookie,
    AuthorizationHeader,
}

/// Terminal outcome of a failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingCredential,

    #[error("invalid or expired token")]
    InvalidCredential,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        json_error(StatusCode::UNAUTHORIZED, self.to_string())
    }
}

/// Pick the credential to evaluate, honouring cookie precedence.
pub fn extract_token(headers: &HeaderMap) -> Option<(String, CredentialSource)> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some((cookie.value().to_string(), CredentialSource::Cookie));
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .filter(|token| !token.is_empty())
        .map(|token| (token.to_string(), CredentialSource::AuthorizationHeader))
}

/// Authenticate `request`, enriching it with the caller's identity.
pub fn authenticate<B>(
    verifier: &dyn TokenVerifier,
    request: &mut Request<B>,
) -> Result<Identity, AuthError> {
    let (token, source) = extract_token(request.headers()).ok_or_else(|| {
        tracing::debug!(path = %request.uri().path(), "No credential presented");
        AuthError::MissingCredential
    })?;

    let identity = verifier.verify(&token).map_err(|e| {
        tracing::debug!(
            path = %request.uri().path(),
            source = ?source,
            error = %e,
            "Credential rejected"
        );
        AuthError::InvalidCredential
    })?;

    let value = HeaderValue::from_str(&identity.subject).map_err(|_| {
        tracing::warn!("Token subject is not a valid header value");
        AuthError::InvalidCredential
    })?;

    request.headers_mut().insert(X_USER_ID, value);
    request.extensions_mut().insert(identity.clone());
    Ok(identity)
}
