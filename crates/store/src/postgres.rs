use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use docchat_core::{ChatMessage, Role};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::models::{Document, Note, StoreError, User};

const UNIQUE_VIOLATION: &str = "23505";

/// Relational records in PostgreSQL. The schema is owned by `db_migrations`.
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        tracing::info!("Record store connected (max {} connections)", max_connections);

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let user = User::new(username, password_hash);
        let result = sqlx::query(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(StoreError::UsernameTaken(username.to_string()).into())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to insert user")),
        }
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up user")?;

        row.map(|row| -> Result<User> {
            Ok(User {
                id: row.try_get("id")?,
                username: row.try_get("username")?,
                password_hash: row.try_get("password_hash")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    pub async fn insert_document(&self, document: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents
                (id, user_id, name, file_path, is_deleted, is_indexed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(document.id)
        .bind(document.user_id)
        .bind(&document.name)
        .bind(&document.file_path)
        .bind(document.is_deleted)
        .bind(document.is_indexed)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert document")?;
        Ok(())
    }

    pub async fn mark_indexed(&self, document_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE documents SET is_indexed = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .context("Failed to mark document indexed")?;
        Ok(())
    }

    pub async fn soft_delete_document(&self, document_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE documents SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND user_id = $2",
        )
        .bind(document_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to delete document")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_document_for_user(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND user_id = $2"
        ))
        .bind(document_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up document")?;

        row.as_ref().map(document_from_row).transpose()
    }

    pub async fn active_documents(&self, user_id: Uuid) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE user_id = $1 AND is_deleted = FALSE
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list documents")?;

        rows.iter().map(document_from_row).collect()
    }

    pub async fn filter_active_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM documents WHERE user_id = $1 AND is_deleted = FALSE AND id = ANY($2)",
        )
        .bind(user_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to validate document selection")?;

        Ok(ids.iter().filter(|id| found.contains(id)).copied().collect())
    }

    pub async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, user_id, role, content, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.id)
        .bind(message.user_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to store chat message")?;
        Ok(())
    }

    pub async fn messages_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, user_id, role, content, created_at FROM chat_messages
             WHERE user_id = $1 AND created_at >= $2
             ORDER BY created_at ASC",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load chat history")?;

        rows.iter()
            .map(|row| -> Result<ChatMessage> {
                let role: String = row.try_get("role")?;
                Ok(ChatMessage {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    role: role.parse::<Role>()?,
                    content: row.try_get("content")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    pub async fn clear_messages(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to clear chat history")?;
        Ok(result.rows_affected())
    }

    pub async fn create_note(&self, user_id: Uuid, title: &str, content: &str) -> Result<Note> {
        let note = Note::new(user_id, title, content);
        sqlx::query(
            r#"
            INSERT INTO notes (id, user_id, title, content, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(note.id)
        .bind(note.user_id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.is_deleted)
        .bind(note.created_at)
        .bind(note.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert note")?;
        Ok(note)
    }

    pub async fn find_active_note(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<Note>> {
        Ok(self
            .find_note_for_user(note_id, user_id)
            .await?
            .filter(|note| !note.is_deleted))
    }

    pub async fn find_note_for_user(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1 AND user_id = $2"
        ))
        .bind(note_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up note")?;

        row.as_ref().map(note_from_row).transpose()
    }

    pub async fn update_note(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            "UPDATE notes SET title = $3, content = $4, updated_at = NOW()
             WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE
             RETURNING {NOTE_COLUMNS}"
        ))
        .bind(note_id)
        .bind(user_id)
        .bind(title)
        .bind(content)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update note")?;

        row.as_ref().map(note_from_row).transpose()
    }

    pub async fn soft_delete_note(&self, note_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notes SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1 AND user_id = $2",
        )
        .bind(note_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to delete note")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_notes(&self, user_id: Uuid, query: Option<&str>) -> Result<Vec<Note>> {
        let pattern = query.map(|q| format!("%{}%", escape_like(q)));
        let rows = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             WHERE user_id = $1 AND is_deleted = FALSE
               AND ($2::TEXT IS NULL OR title ILIKE $2 OR content ILIKE $2)
             ORDER BY updated_at DESC"
        ))
        .bind(user_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list notes")?;

        rows.iter().map(note_from_row).collect()
    }
}

const DOCUMENT_COLUMNS: &str =
    "id, user_id, name, file_path, is_deleted, is_indexed, created_at, updated_at";

const NOTE_COLUMNS: &str = "id, user_id, title, content, is_deleted, created_at, updated_at";

fn document_from_row(row: &PgRow) -> Result<Document> {
    Ok(Document {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        file_path: row.try_get("file_path")?,
        is_deleted: row.try_get("is_deleted")?,
        is_indexed: row.try_get("is_indexed")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn note_from_row(row: &PgRow) -> Result<Note> {
    Ok(Note {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        is_deleted: row.try_get("is_deleted")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Escapes `ILIKE` wildcards so the search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
