use chrono::{DateTime, Utc};
use docchat_core::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use store::{Document, Note, User};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub name: String,
    pub is_indexed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id,
            name: document.name.clone(),
            is_indexed: document.is_indexed,
            created_at: document.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailedUpload {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UploadSummary {
    pub uploaded: Vec<DocumentSummary>,
    pub failed: Vec<FailedUpload>,
}

#[derive(Debug, Deserialize)]
pub struct ChatSendRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub document_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageView {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ChatMessage> for ChatMessageView {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub success: bool,
    pub message: ChatMessageView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatPageResponse {
    pub documents: Vec<DocumentSummary>,
    pub messages: Vec<ChatMessageView>,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct NoteListQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoteView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Note> for NoteView {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id,
            title: note.title.clone(),
            content: note.content.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NoteListResponse {
    pub notes: Vec<NoteView>,
    pub search_query: String,
}
