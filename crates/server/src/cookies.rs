//! Minimal cookie helpers for the session and alert cookies.
//!
//! Cookie format: `name=value; HttpOnly; SameSite=Lax; Path=/; Max-Age=N`.
//! Values written here are hex tokens, so no escaping is needed.

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, HeaderValue};

pub const SESSION_COOKIE: &str = "sessionid";
pub const ALERT_COOKIE: &str = "alertsid";

/// One year; the alert cookie only identifies the client.
pub const ALERT_COOKIE_MAX_AGE: u64 = 365 * 24 * 60 * 60;

pub fn build_cookie(name: &str, value: &str, max_age_secs: u64) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, value, max_age_secs
    ))
    .ok()
}

pub fn clear_cookie(name: &str) -> Option<HeaderValue> {
    build_cookie(name, "", 0)
}

/// Value of the named cookie across every `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|part| part.trim().strip_prefix(prefix.as_str()))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Auth token from `Authorization: Bearer`, else the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_value(headers, SESSION_COOKIE))
}
