//! Password hashing, registration rules and the session middleware.
//!
//! `require_auth` resolves the session token (Bearer header or `sessionid`
//! cookie) and stores a [`CurrentUser`] in the request extensions, which
//! handlers then extract.

use crate::cookies::session_token;
use crate::errors::{AppError, FieldErrors};
use crate::state::AppState;
use anyhow::Context;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub const USERNAME_MAX_CHARS: usize = 150;
pub const PASSWORD_MIN_CHARS: usize = 8;

const REQUIRED: &str = "This field is required.";

/// Runs bcrypt on the blocking pool.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_string();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("Password hashing task failed")?
        .context("Failed to hash password")?;
    Ok(hash)
}

/// False for a wrong password and for an unreadable hash.
pub async fn verify_password(password: &str, hash: &str) -> bool {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

fn valid_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

/// Sign-up form checks, collected per field.
pub fn validate_registration(
    username: &str,
    password: &str,
    password_confirm: &str,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    let username_len = username.chars().count();
    if username.is_empty() {
        errors.entry("username").or_default().push(REQUIRED.to_string());
    } else if username_len > USERNAME_MAX_CHARS {
        errors.entry("username").or_default().push(format!(
            "Ensure this value has at most {} characters (it has {}).",
            USERNAME_MAX_CHARS, username_len
        ));
    } else if !username.chars().all(valid_username_char) {
        errors.entry("username").or_default().push(
            "Enter a valid username. This value may contain only letters, numbers, \
             and @/./+/-/_ characters."
                .to_string(),
        );
    }

    if password.is_empty() {
        errors.entry("password").or_default().push(REQUIRED.to_string());
    }
    if password_confirm.is_empty() {
        errors
            .entry("password_confirm")
            .or_default()
            .push(REQUIRED.to_string());
    }

    if !password.is_empty() && !password_confirm.is_empty() {
        if password != password_confirm {
            errors
                .entry("password_confirm")
                .or_default()
                .push("The two password fields didn't match.".to_string());
        } else {
            if password.chars().count() < PASSWORD_MIN_CHARS {
                errors.entry("password_confirm").or_default().push(format!(
                    "This password is too short. It must contain at least {} characters.",
                    PASSWORD_MIN_CHARS
                ));
            }
            if password.chars().all(|c| c.is_ascii_digit()) {
                errors
                    .entry("password_confirm")
                    .or_default()
                    .push("This password is entirely numeric.".to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The logged-in user of a request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

/// Resolves the session token, if any, to a user.
pub async fn resolve_session(
    state: &AppState,
    headers: &axum::http::HeaderMap,
) -> Result<Option<CurrentUser>, AppError> {
    let Some(token) = session_token(headers) else {
        return Ok(None);
    };
    let session = state.sessions.get(&token).await?;
    Ok(session.map(|session| CurrentUser {
        user_id: session.user_id,
        username: session.username,
        token,
    }))
}

/// Rejects requests without a live session with 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = resolve_session(&state, req.headers())
        .await?
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}
