use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Failures callers are expected to branch on; everything else is an
/// opaque `anyhow::Error`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("A user with username '{0}' already exists")]
    UsernameTaken(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }
}

/// An uploaded file. Documents are soft-deleted and never physically removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub file_path: String,
    pub is_deleted: bool,
    pub is_indexed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(user_id: Uuid, name: impl Into<String>, file_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            file_path: file_path.into(),
            is_deleted: false,
            is_indexed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn file_extension(&self) -> String {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(user_id: Uuid, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            content: content.into(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Case-insensitive substring match on title or content.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query) || self.content.to_lowercase().contains(&query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_derive_document_extension() {
        let owner = Uuid::new_v4();
        assert_eq!(Document::new(owner, "Guide.DOCX", "a").file_extension(), "docx");
        assert_eq!(Document::new(owner, "LICENSE", "b").file_extension(), "");
    }

    #[test]
    fn should_start_documents_active_and_unindexed() {
        let document = Document::new(Uuid::new_v4(), "a.pdf", "documents/a.pdf");
        assert!(!document.is_deleted);
        assert!(!document.is_indexed);
        assert_eq!(document.created_at, document.updated_at);
    }

    #[test]
    fn should_match_notes_ignoring_case() {
        let note = Note::new(Uuid::new_v4(), "Groceries", "Buy MILK and eggs");
        assert!(note.matches("grocer"));
        assert!(note.matches("milk"));
        assert!(!note.matches("bread"));
    }

    #[test]
    fn should_not_serialize_password_hash() {
        let user = User::new("alice", "$2b$12$hash");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["username"], "alice");
        assert!(json.get("password_hash").is_none());
    }
}
