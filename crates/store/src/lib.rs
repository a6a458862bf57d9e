pub mod memory;
pub mod models;
pub mod postgres;
pub mod sessions;

use anyhow::Result;
use chrono::{DateTime, Utc};
use docchat_core::ChatMessage;
use uuid::Uuid;

pub use memory::MemoryRecordStore;
pub use models::{Document, Note, StoreError, User};
pub use postgres::PgRecordStore;
pub use sessions::{AnySessionStore, AuthSession, MemorySessionStore, RedisSessionStore};

pub enum AnyRecordStore {
    Postgres(PgRecordStore),
    Memory(MemoryRecordStore),
}

impl AnyRecordStore {
    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        match self {
            AnyRecordStore::Postgres(store) => store.create_user(username, password_hash).await,
            AnyRecordStore::Memory(store) => store.create_user(username, password_hash).await,
        }
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        match self {
            AnyRecordStore::Postgres(store) => store.find_user_by_username(username).await,
            AnyRecordStore::Memory(store) => store.find_user_by_username(username).await,
        }
    }

    pub async fn insert_document(&self, document: &Document) -> Result<()> {
        match self {
            AnyRecordStore::Postgres(store) => store.insert_document(document).await,
            AnyRecordStore::Memory(store) => store.insert_document(document).await,
        }
    }

    pub async fn mark_indexed(&self, document_id: Uuid) -> Result<()> {
        match self {
            AnyRecordStore::Postgres(store) => store.mark_indexed(document_id).await,
            AnyRecordStore::Memory(store) => store.mark_indexed(document_id).await,
        }
    }

    pub async fn soft_delete_document(&self, document_id: Uuid, user_id: Uuid) -> Result<bool> {
        match self {
            AnyRecordStore::Postgres(store) => {
                store.soft_delete_document(document_id, user_id).await
            }
            AnyRecordStore::Memory(store) => store.soft_delete_document(document_id, user_id).await,
        }
    }

    /// Finds a document owned by `user_id`, deleted or not.
    pub async fn find_document_for_user(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Document>> {
        match self {
            AnyRecordStore::Postgres(store) => {
                store.find_document_for_user(document_id, user_id).await
            }
            AnyRecordStore::Memory(store) => {
                store.find_document_for_user(document_id, user_id).await
            }
        }
    }

    pub async fn active_documents(&self, user_id: Uuid) -> Result<Vec<Document>> {
        match self {
            AnyRecordStore::Postgres(store) => store.active_documents(user_id).await,
            AnyRecordStore::Memory(store) => store.active_documents(user_id).await,
        }
    }

    /// Keeps the ids that name active documents of `user_id`, in input order.
    pub async fn filter_active_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        match self {
            AnyRecordStore::Postgres(store) => store.filter_active_ids(user_id, ids).await,
            AnyRecordStore::Memory(store) => store.filter_active_ids(user_id, ids).await,
        }
    }

    pub async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        match self {
            AnyRecordStore::Postgres(store) => store.append_message(message).await,
            AnyRecordStore::Memory(store) => store.append_message(message).await,
        }
    }

    /// Chat messages created at or after `since`, oldest first.
    pub async fn messages_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChatMessage>> {
        match self {
            AnyRecordStore::Postgres(store) => store.messages_since(user_id, since).await,
            AnyRecordStore::Memory(store) => store.messages_since(user_id, since).await,
        }
    }

    pub async fn clear_messages(&self, user_id: Uuid) -> Result<u64> {
        match self {
            AnyRecordStore::Postgres(store) => store.clear_messages(user_id).await,
            AnyRecordStore::Memory(store) => store.clear_messages(user_id).await,
        }
    }

    pub async fn create_note(&self, user_id: Uuid, title: &str, content: &str) -> Result<Note> {
        match self {
            AnyRecordStore::Postgres(store) => store.create_note(user_id, title, content).await,
            AnyRecordStore::Memory(store) => store.create_note(user_id, title, content).await,
        }
    }

    pub async fn find_active_note(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<Note>> {
        match self {
            AnyRecordStore::Postgres(store) => store.find_active_note(note_id, user_id).await,
            AnyRecordStore::Memory(store) => store.find_active_note(note_id, user_id).await,
        }
    }

    pub async fn find_note_for_user(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<Note>> {
        match self {
            AnyRecordStore::Postgres(store) => store.find_note_for_user(note_id, user_id).await,
            AnyRecordStore::Memory(store) => store.find_note_for_user(note_id, user_id).await,
        }
    }

    pub async fn update_note(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<Option<Note>> {
        match self {
            AnyRecordStore::Postgres(store) => {
                store.update_note(note_id, user_id, title, content).await
            }
            AnyRecordStore::Memory(store) => {
                store.update_note(note_id, user_id, title, content).await
            }
        }
    }

    pub async fn soft_delete_note(&self, note_id: Uuid, user_id: Uuid) -> Result<bool> {
        match self {
            AnyRecordStore::Postgres(store) => store.soft_delete_note(note_id, user_id).await,
            AnyRecordStore::Memory(store) => store.soft_delete_note(note_id, user_id).await,
        }
    }

    /// Active notes, most recently updated first, optionally filtered by a
    /// case-insensitive search on title and content.
    pub async fn list_notes(&self, user_id: Uuid, query: Option<&str>) -> Result<Vec<Note>> {
        match self {
            AnyRecordStore::Postgres(store) => store.list_notes(user_id, query).await,
            AnyRecordStore::Memory(store) => store.list_notes(user_id, query).await,
        }
    }
}
