pub mod accounts;
pub mod chat;
pub mod documents;
pub mod notes;

use crate::auth::resolve_session;
use crate::cookies::{build_cookie, SESSION_COOKIE};
use crate::errors::AppError;
use crate::state::AppState;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde_json::{json, Value};
use uuid::Uuid;

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// GET /
pub async fn home(State(state): State<AppState>, headers: HeaderMap) -> Result<Redirect, AppError> {
    let target = match resolve_session(&state, &headers).await? {
        Some(_) => "/chat/",
        None => "/accounts/login/",
    };
    Ok(Redirect::to(target))
}

/// Appends a `Set-Cookie` header when the cookie could be built.
pub(crate) fn with_cookie(response: impl IntoResponse, cookie: Option<HeaderValue>) -> Response {
    let mut response = response.into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

pub(crate) fn session_cookie(state: &AppState, token: &str) -> Option<HeaderValue> {
    build_cookie(SESSION_COOKIE, token, state.config.redis.session_ttl_seconds)
}

/// Path ids that are not UUIDs cannot match a record.
pub(crate) fn parse_id(raw: &str, not_found: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(not_found.to_string()))
}
