use super::parse_id;
use crate::alerts::AlertKey;
use crate::auth::CurrentUser;
use crate::errors::{AppError, FieldErrors};
use crate::models::{NoteListQuery, NoteListResponse, NoteRequest, NoteView};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};

pub const TITLE_MAX_CHARS: usize = 200;

const NOTE_NOT_FOUND: &str = "Note not found.";

/// Trimmed title and content, or the form errors.
fn validate_note(request: &NoteRequest) -> Result<(String, String), AppError> {
    let title = request.title.trim();
    let mut errors = FieldErrors::new();

    if title.is_empty() {
        errors
            .entry("title")
            .or_default()
            .push("This field is required.".to_string());
    } else {
        let len = title.chars().count();
        if len > TITLE_MAX_CHARS {
            errors.entry("title").or_default().push(format!(
                "Ensure this value has at most {} characters (it has {}).",
                TITLE_MAX_CHARS, len
            ));
        }
    }

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    Ok((title.to_string(), request.content.trim().to_string()))
}

/// GET /notes/?q=
pub async fn list_notes(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<NoteListQuery>,
) -> Result<Json<NoteListResponse>, AppError> {
    let search_query = query.q.unwrap_or_default();
    let filter = Some(search_query.as_str()).filter(|q| !q.is_empty());
    let notes = state.records.list_notes(user.user_id, filter).await?;

    Ok(Json(NoteListResponse {
        notes: notes.iter().map(NoteView::from).collect(),
        search_query,
    }))
}

/// POST /notes/create/
pub async fn create_note(
    State(state): State<AppState>,
    user: CurrentUser,
    key: AlertKey,
    Json(request): Json<NoteRequest>,
) -> Result<(StatusCode, Json<NoteView>), AppError> {
    let (title, content) = validate_note(&request)?;
    let note = state
        .records
        .create_note(user.user_id, &title, &content)
        .await?;

    state
        .alerts
        .success(key.as_str(), "Note created successfully.")
        .await;

    Ok((StatusCode::CREATED, Json(NoteView::from(&note))))
}

/// GET /notes/:id/
pub async fn note_detail(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<NoteView>, AppError> {
    let id = parse_id(&id, NOTE_NOT_FOUND)?;
    let note = state
        .records
        .find_active_note(id, user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOTE_NOT_FOUND.to_string()))?;

    Ok(Json(NoteView::from(&note)))
}

/// POST /notes/:id/edit/
pub async fn update_note(
    State(state): State<AppState>,
    user: CurrentUser,
    key: AlertKey,
    Path(id): Path<String>,
    Json(request): Json<NoteRequest>,
) -> Result<Json<NoteView>, AppError> {
    let id = parse_id(&id, NOTE_NOT_FOUND)?;
    if state.records.find_active_note(id, user.user_id).await?.is_none() {
        return Err(AppError::NotFound(NOTE_NOT_FOUND.to_string()));
    }

    let (title, content) = validate_note(&request)?;
    let note = state
        .records
        .update_note(id, user.user_id, &title, &content)
        .await?
        .ok_or_else(|| AppError::NotFound(NOTE_NOT_FOUND.to_string()))?;

    state
        .alerts
        .success(key.as_str(), "Note updated successfully.")
        .await;

    Ok(Json(NoteView::from(&note)))
}

/// POST /notes/:id/delete/. Succeeds again for an already deleted note of
/// the same user.
pub async fn delete_note(
    State(state): State<AppState>,
    user: CurrentUser,
    key: AlertKey,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id, NOTE_NOT_FOUND)?;
    if state.records.find_note_for_user(id, user.user_id).await?.is_none() {
        return Err(AppError::NotFound(NOTE_NOT_FOUND.to_string()));
    }

    state.records.soft_delete_note(id, user.user_id).await?;
    state
        .alerts
        .success(key.as_str(), "Note deleted successfully.")
        .await;

    Ok(Json(json!({"success": true})))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str, content: &str) -> NoteRequest {
        NoteRequest {
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn should_trim_valid_note() {
        let (title, content) = validate_note(&request("  Groceries ", " milk\n")).unwrap();
        assert_eq!(title, "Groceries");
        assert_eq!(content, "milk");
    }

    #[test]
    fn should_allow_empty_content() {
        assert!(validate_note(&request("Title", "")).is_ok());
    }

    #[test]
    fn should_require_title() {
        let Err(AppError::Validation(errors)) = validate_note(&request("   ", "body")) else {
            panic!("expected validation error");
        };
        assert_eq!(errors["title"], vec!["This field is required.".to_string()]);
    }

    #[test]
    fn should_limit_title_length() {
        let long = "x".repeat(201);
        let Err(AppError::Validation(errors)) = validate_note(&request(&long, "")) else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors["title"],
            vec!["Ensure this value has at most 200 characters (it has 201).".to_string()]
        );
    }
}
