//! Endpoints answered by the gateway without an upstream.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::auth::ACCESS_TOKEN_COOKIE;

pub const LIVENESS_BODY: &str = "api-gateway is alive";

pub fn healthcheck() -> Response {
    (StatusCode::OK, LIVENESS_BODY).into_response()
}

/// Expire the session cookie on the client.
pub fn logout(cookie_secure: bool) -> Response {
    let mut cookie = Cookie::build((ACCESS_TOKEN_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(cookie_secure)
        .same_site(SameSite::None)
        .build();
    cookie.make_removal();

    (CookieJar::new().add(cookie), StatusCode::OK).into_response()
}
