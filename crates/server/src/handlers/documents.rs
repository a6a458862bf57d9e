use super::parse_id;
use crate::alerts::AlertKey;
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::{DocumentListResponse, DocumentSummary, FailedUpload, UploadSummary};
use crate::state::AppState;
use anyhow::Context;
use axum::extract::{Multipart, Path, State};
use axum::response::Json;
use chrono::Utc;
use serde_json::{json, Value};
use store::Document;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Multipart field carrying uploaded files.
const FILE_FIELD: &str = "file";
const DOCUMENT_NOT_FOUND: &str = "Document not found.";

struct UploadedFile {
    name: String,
    bytes: axum::body::Bytes,
}

/// GET /documents/
pub async fn list_documents(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<DocumentListResponse>, AppError> {
    let documents = state.records.active_documents(user.user_id).await?;
    Ok(Json(DocumentListResponse {
        documents: documents.iter().map(DocumentSummary::from).collect(),
    }))
}

async fn read_files(mut multipart: Multipart) -> Result<Vec<UploadedFile>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;
        if name.is_empty() && bytes.is_empty() {
            continue;
        }
        files.push(UploadedFile { name, bytes });
    }
    Ok(files)
}

/// Writes the file under the media root and records it.
async fn store_upload(
    state: &AppState,
    user_id: Uuid,
    file: &UploadedFile,
) -> anyhow::Result<Document> {
    let relative = ingest::storage_path(Utc::now(), &file.name);
    let full_path = state.media_root().join(&relative);
    if let Some(parent) = full_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&full_path, &file.bytes)
        .await
        .with_context(|| format!("Failed to write {}", full_path.display()))?;

    let document = Document::new(user_id, &file.name, relative.to_string_lossy());
    let recorded = state.records.insert_document(&document).await;
    discard_on_error(&full_path, recorded).await?;
    Ok(document)
}

/// Removes the stored file when recording it failed.
async fn discard_on_error<T>(
    path: &std::path::Path,
    result: anyhow::Result<T>,
) -> anyhow::Result<T> {
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove orphaned upload {}: {}", path.display(), e);
        }
    }
    result
}

/// POST /documents/upload/
pub async fn upload_documents(
    State(state): State<AppState>,
    user: CurrentUser,
    key: AlertKey,
    multipart: Multipart,
) -> Result<Json<UploadSummary>, AppError> {
    let files = read_files(multipart).await?;
    if files.is_empty() {
        let message = "No files selected.";
        state.alerts.error(key.as_str(), message).await;
        return Err(AppError::BadRequest(message.to_string()));
    }

    let mut summary = UploadSummary::default();
    for file in &files {
        if let Err(rejection) = state.uploads.validate(&file.name, file.bytes.len() as u64) {
            let message = rejection.to_string();
            state.alerts.error(key.as_str(), message.clone()).await;
            summary.failed.push(FailedUpload {
                name: file.name.clone(),
                error: message,
            });
            continue;
        }

        let mut document = match store_upload(&state, user.user_id, file).await {
            Ok(document) => document,
            Err(e) => {
                error!("Upload of {} failed: {:#}", file.name, e);
                let message = format!("Error uploading '{}': {}", file.name, e);
                state.alerts.error(key.as_str(), message.clone()).await;
                summary.failed.push(FailedUpload {
                    name: file.name.clone(),
                    error: message,
                });
                continue;
            }
        };

        if !state.rag.index_document(&document, user.user_id).await {
            let message = format!("Indexing failed for '{}'.", file.name);
            warn!("{}", message);
            state.alerts.warning(key.as_str(), message.clone()).await;
            summary.failed.push(FailedUpload {
                name: file.name.clone(),
                error: message,
            });
            continue;
        }

        if let Err(e) = state.records.mark_indexed(document.id).await {
            let message = format!("Error uploading '{}': {}", file.name, e);
            state.alerts.error(key.as_str(), message.clone()).await;
            summary.failed.push(FailedUpload {
                name: file.name.clone(),
                error: message,
            });
            continue;
        }
        document.is_indexed = true;
        info!("Uploaded and indexed {} for user {}", document.name, user.user_id);
        summary.uploaded.push(DocumentSummary::from(&document));
    }

    if !summary.uploaded.is_empty() {
        state
            .alerts
            .success(
                key.as_str(),
                format!(
                    "Successfully uploaded and indexed {} document(s).",
                    summary.uploaded.len()
                ),
            )
            .await;
    }
    if !summary.failed.is_empty() {
        state
            .alerts
            .info(
                key.as_str(),
                format!("Failed to process {} document(s).", summary.failed.len()),
            )
            .await;
    }

    Ok(Json(summary))
}

/// POST /documents/delete/:id/. Deleting an already deleted document of the
/// same user succeeds again.
pub async fn delete_document(
    State(state): State<AppState>,
    user: CurrentUser,
    key: AlertKey,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id, DOCUMENT_NOT_FOUND)?;
    let document = state
        .records
        .find_document_for_user(id, user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(DOCUMENT_NOT_FOUND.to_string()))?;

    state
        .records
        .soft_delete_document(document.id, user.user_id)
        .await?;
    state
        .rag
        .delete_document_embeddings(document.id, user.user_id)
        .await;

    state
        .alerts
        .success(key.as_str(), format!("'{}' has been deleted.", document.name))
        .await;

    Ok(Json(json!({"success": true})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_remove_file_when_recording_fails() {
        let media = tempfile::tempdir().unwrap();
        let path = media.path().join("report.txt");
        tokio::fs::write(&path, b"contents").await.unwrap();

        let result: anyhow::Result<()> =
            discard_on_error(&path, Err(anyhow::anyhow!("insert failed"))).await;

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn should_keep_file_when_recording_succeeds() {
        let media = tempfile::tempdir().unwrap();
        let path = media.path().join("report.txt");
        tokio::fs::write(&path, b"contents").await.unwrap();

        let result = discard_on_error(&path, Ok(7)).await;

        assert_eq!(result.unwrap(), 7);
        assert!(path.exists());
    }
}
