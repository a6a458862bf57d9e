//! Account endpoints:
//! - `POST /accounts/register/` creates a user and logs them in
//! - `POST /accounts/login/`    opens a session
//! - `GET|POST /accounts/logout/` closes the session, if any

use super::{session_cookie, with_cookie};
use crate::alerts::AlertKey;
use crate::auth::{hash_password, resolve_session, validate_registration, verify_password};
use crate::cookies::{clear_cookie, SESSION_COOKIE};
use crate::errors::AppError;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, UserView};
use crate::state::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Json, Response};
use serde_json::json;
use store::{StoreError, User};
use tracing::{info, warn};

async fn open_session(state: &AppState, user: &User) -> Result<(String, AuthResponse), AppError> {
    let (token, _) = state.sessions.create(user.id, &user.username).await?;
    let body = AuthResponse {
        token: token.clone(),
        user: UserView::from(user),
    };
    Ok((token, body))
}

pub async fn register(
    State(state): State<AppState>,
    key: AlertKey,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let username = request.username.trim();
    validate_registration(username, &request.password, &request.password_confirm)
        .map_err(AppError::Validation)?;

    let password_hash = hash_password(&request.password, state.password_cost).await?;
    let user = match state.records.create_user(username, &password_hash).await {
        Ok(user) => user,
        Err(e) if e.downcast_ref::<StoreError>().is_some() => {
            return Err(AppError::Conflict(
                "A user with that username already exists.".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };
    info!("Registered user {}", user.username);

    let (token, body) = open_session(&state, &user).await?;
    state
        .alerts
        .success(key.as_str(), "Account created successfully!")
        .await;

    Ok(with_cookie(
        (StatusCode::CREATED, Json(body)),
        session_cookie(&state, &token),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    key: AlertKey,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let username = request.username.trim();
    let found = state.records.find_user_by_username(username).await?;
    let authenticated = match &found {
        Some(user) => verify_password(&request.password, &user.password_hash).await,
        None => false,
    };
    let user = match found {
        Some(user) if authenticated => user,
        _ => {
            warn!("Failed login for {}", username);
            let message = "Invalid username or password.";
            state.alerts.error(key.as_str(), message).await;
            return Err(AppError::Unauthorized(message.to_string()));
        }
    };

    let (token, body) = open_session(&state, &user).await?;
    state
        .alerts
        .success(key.as_str(), format!("Welcome back, {}!", user.username))
        .await;

    Ok(with_cookie(Json(body), session_cookie(&state, &token)))
}

pub async fn logout(
    State(state): State<AppState>,
    key: AlertKey,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(user) = resolve_session(&state, &headers).await? {
        state.sessions.delete(&user.token).await?;
        info!("User {} logged out", user.username);
    }
    state
        .alerts
        .info(key.as_str(), "You have been logged out.")
        .await;

    Ok(with_cookie(
        Json(json!({"success": true})),
        clear_cookie(SESSION_COOKIE),
    ))
}
