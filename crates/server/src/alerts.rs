//! HTTP side of the alert boards.
//!
//! Boards are keyed by the `alertsid` cookie, or by the Bearer token for
//! clients that do not keep cookies. `alert_session` resolves the key once
//! per request and issues the cookie when the client has neither.

use crate::cookies::{bearer_token, build_cookie, cookie_value, ALERT_COOKIE, ALERT_COOKIE_MAX_AGE};
use crate::state::AppState;
use axum::extract::{FromRequestParts, Path, Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use docchat_core::AlertView;
use serde::Serialize;
use std::convert::Infallible;
use uuid::Uuid;

/// Key of the caller's alert board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertKey(pub String);

impl AlertKey {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        cookie_value(headers, ALERT_COOKIE)
            .or_else(|| bearer_token(headers))
            .map(AlertKey)
    }

    fn fresh() -> Self {
        AlertKey(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub async fn alert_session(mut req: Request, next: Next) -> Response {
    let (key, issued) = match AlertKey::from_headers(req.headers()) {
        Some(key) => (key, false),
        None => (AlertKey::fresh(), true),
    };
    req.extensions_mut().insert(key.clone());

    let mut response = next.run(req).await;
    if issued {
        if let Some(cookie) = build_cookie(ALERT_COOKIE, key.as_str(), ALERT_COOKIE_MAX_AGE) {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
    }
    response
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AlertKey {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AlertKey>()
            .cloned()
            .or_else(|| AlertKey::from_headers(&parts.headers))
            .unwrap_or_else(AlertKey::fresh))
    }
}

#[derive(Debug, Serialize)]
pub struct TimingsView {
    pub auto_dismiss_ms: u64,
    pub manual_fade_ms: u64,
    pub auto_fade_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<AlertView>,
    pub timings: TimingsView,
}

/// GET /alerts/
pub async fn list_alerts(State(state): State<AppState>, key: AlertKey) -> Json<AlertsResponse> {
    let alerts = state.alerts.render(key.as_str()).await;
    let timings = state.alerts.timings();

    Json(AlertsResponse {
        alerts,
        timings: TimingsView {
            auto_dismiss_ms: timings.auto_dismiss.as_millis() as u64,
            manual_fade_ms: timings.manual_fade.as_millis() as u64,
            auto_fade_ms: timings.auto_fade.as_millis() as u64,
        },
    })
}

/// POST /alerts/:id/dismiss. Unknown, foreign and already dismissed ids
/// are accepted silently.
pub async fn dismiss_alert(
    State(state): State<AppState>,
    key: AlertKey,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Ok(id) = Uuid::parse_str(&id) {
        state.alerts.dismiss(key.as_str(), id).await;
    }
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn should_prefer_alert_cookie_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("alertsid=board1"));
        headers.insert("authorization", HeaderValue::from_static("Bearer tok"));

        assert_eq!(
            AlertKey::from_headers(&headers),
            Some(AlertKey("board1".to_string()))
        );
    }

    #[test]
    fn should_fall_back_to_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer tok"));

        assert_eq!(
            AlertKey::from_headers(&headers),
            Some(AlertKey("tok".to_string()))
        );
        assert_eq!(AlertKey::from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn should_generate_distinct_fresh_keys() {
        assert_ne!(AlertKey::fresh(), AlertKey::fresh());
    }
}
