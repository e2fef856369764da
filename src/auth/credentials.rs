//! Credential extraction adapters.
//!
//! Page navigation carries the session token in a cookie, API calls carry it
//! in an `Authorization: Bearer` header. Both adapters hand the raw token to
//! the same [`Authorizer`](super::Authorizer).

use axum::http::{HeaderMap, header};
use axum_extra::extract::CookieJar;

const BEARER_PREFIX: &str = "Bearer ";

/// Reads the session token from the named cookie. Empty values count as absent.
pub fn token_from_cookie<'a>(jar: &'a CookieJar, cookie_name: &str) -> Option<&'a str> {
    jar.get(cookie_name)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
}

/// Reads the bearer token from the `Authorization` header.
///
/// Returns `None` when the header is absent, not valid UTF-8, uses another
/// scheme, or carries an empty token (`"Bearer "`).
pub fn token_from_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
