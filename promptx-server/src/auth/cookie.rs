//! The `token` session cookie.

use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use chrono::Duration;

pub const TOKEN_COOKIE: &str = "token";

/// Session token from the `token` cookie, else from `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_owned())
        .filter(|v| !v.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    })
}

pub fn set_token(token: &str, ttl: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{TOKEN_COOKIE}={token}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        ttl.num_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_token(secure: bool) -> String {
    set_token("", Duration::zero(), secure)
}
