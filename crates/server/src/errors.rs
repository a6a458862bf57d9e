use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::collections::BTreeMap;
use thiserror::Error;

/// Per-field validation messages, keyed by form field name.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Please correct the errors below.")]
    Validation(FieldErrors),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        self.status().as_u16()
    }

    /// Only infrastructure failures can succeed on a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Internal(_))
    }

    fn log(&self) {
        if let AppError::Internal(e) = self {
            tracing::error!("Request failed: {:#}", e);
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status();
        let mut body = serde_json::json!({ "error": self.to_string() });
        if let AppError::Validation(errors) = &self {
            body["errors"] = serde_json::json!(errors);
        }
        (status, Json(body)).into_response()
    }
}

/// Error envelope of the chat API: `{"success": false, "error": ...}`.
#[derive(Debug)]
pub struct ChatApiError(pub AppError);

impl<E: Into<AppError>> From<E> for ChatApiError {
    fn from(err: E) -> Self {
        ChatApiError(err.into())
    }
}

impl IntoResponse for ChatApiError {
    fn into_response(self) -> Response {
        let error = self.0;
        error.log();
        let message = match &error {
            AppError::Internal(e) => format!("An error occurred: {}", e),
            other => other.to_string(),
        };
        (
            error.status(),
            Json(serde_json::json!({ "success": false, "error": message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn should_return_correct_http_status_codes() {
        assert_eq!(AppError::BadRequest("x".into()).http_status_code(), 400);
        assert_eq!(AppError::Validation(FieldErrors::new()).http_status_code(), 400);
        assert_eq!(AppError::Unauthorized("x".into()).http_status_code(), 401);
        assert_eq!(AppError::NotFound("x".into()).http_status_code(), 404);
        assert_eq!(AppError::Conflict("x".into()).http_status_code(), 409);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("db down")).http_status_code(),
            500
        );
    }

    #[test]
    fn should_return_correct_retryable_flags() {
        assert!(AppError::Internal(anyhow::anyhow!("timeout")).is_retryable());
        assert!(!AppError::BadRequest("x".into()).is_retryable());
        assert!(!AppError::Unauthorized("x".into()).is_retryable());
    }

    #[tokio::test]
    async fn should_render_error_body() {
        let response = AppError::NotFound("Note not found.".into()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Note not found.");
    }

    #[tokio::test]
    async fn should_include_field_errors() {
        let mut errors = FieldErrors::new();
        errors.insert("title", vec!["This field is required.".to_string()]);

        let body = body_json(AppError::Validation(errors).into_response()).await;

        assert_eq!(body["error"], "Please correct the errors below.");
        assert_eq!(body["errors"]["title"][0], "This field is required.");
    }

    #[tokio::test]
    async fn should_wrap_chat_errors_in_success_envelope() {
        let response =
            ChatApiError(AppError::BadRequest("Please enter a message.".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Please enter a message.");
    }

    #[tokio::test]
    async fn should_prefix_internal_chat_errors() {
        let error: ChatApiError = anyhow::anyhow!("connection reset").into();

        let body = body_json(error.into_response()).await;

        assert_eq!(body["error"], "An error occurred: connection reset");
    }
}
