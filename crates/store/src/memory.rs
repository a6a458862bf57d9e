use anyhow::Result;
use chrono::{DateTime, Utc};
use docchat_core::ChatMessage;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Document, Note, StoreError, User};

/// Process-local record store used when no database is configured and in
/// tests.
#[derive(Default)]
pub struct MemoryRecordStore {
    users: RwLock<HashMap<Uuid, User>>,
    documents: RwLock<HashMap<Uuid, Document>>,
    messages: RwLock<Vec<ChatMessage>>,
    notes: RwLock<HashMap<Uuid, Note>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let mut users = self.users.write().await;
        if users.values().any(|user| user.username == username) {
            return Err(StoreError::UsernameTaken(username.to_string()).into());
        }
        let user = User::new(username, password_hash);
        users.insert(user.id, user.clone());
        Ok(user)
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.username == username).cloned())
    }

    pub async fn insert_document(&self, document: &Document) -> Result<()> {
        self.documents
            .write()
            .await
            .insert(document.id, document.clone());
        Ok(())
    }

    pub async fn mark_indexed(&self, document_id: Uuid) -> Result<()> {
        if let Some(document) = self.documents.write().await.get_mut(&document_id) {
            document.is_indexed = true;
            document.updated_at = Utc::now();
        }
        Ok(())
    }

    pub async fn soft_delete_document(&self, document_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut documents = self.documents.write().await;
        match documents.get_mut(&document_id) {
            Some(document) if document.user_id == user_id => {
                document.is_deleted = true;
                document.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn find_document_for_user(
        &self,
        document_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(&document_id)
            .filter(|document| document.user_id == user_id)
            .cloned())
    }

    pub async fn active_documents(&self, user_id: Uuid) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        let mut active: Vec<Document> = documents
            .values()
            .filter(|document| document.user_id == user_id && !document.is_deleted)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }

    pub async fn filter_active_ids(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let documents = self.documents.read().await;
        Ok(ids
            .iter()
            .filter(|id| {
                documents
                    .get(id)
                    .is_some_and(|d| d.user_id == user_id && !d.is_deleted)
            })
            .copied()
            .collect())
    }

    pub async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    pub async fn messages_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChatMessage>> {
        let messages = self.messages.read().await;
        let mut recent: Vec<ChatMessage> = messages
            .iter()
            .filter(|m| m.user_id == user_id && m.created_at >= since)
            .cloned()
            .collect();
        recent.sort_by_key(|m| m.created_at);
        Ok(recent)
    }

    pub async fn clear_messages(&self, user_id: Uuid) -> Result<u64> {
        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|m| m.user_id != user_id);
        Ok((before - messages.len()) as u64)
    }

    pub async fn create_note(&self, user_id: Uuid, title: &str, content: &str) -> Result<Note> {
        let note = Note::new(user_id, title, content);
        self.notes.write().await.insert(note.id, note.clone());
        Ok(note)
    }

    pub async fn find_active_note(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<Note>> {
        Ok(self
            .find_note_for_user(note_id, user_id)
            .await?
            .filter(|note| !note.is_deleted))
    }

    pub async fn find_note_for_user(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<Note>> {
        let notes = self.notes.read().await;
        Ok(notes
            .get(&note_id)
            .filter(|note| note.user_id == user_id)
            .cloned())
    }

    pub async fn update_note(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<Option<Note>> {
        let mut notes = self.notes.write().await;
        match notes.get_mut(&note_id) {
            Some(note) if note.user_id == user_id && !note.is_deleted => {
                note.title = title.to_string();
                note.content = content.to_string();
                note.updated_at = Utc::now();
                Ok(Some(note.clone()))
            }
            _ => Ok(None),
        }
    }

    pub async fn soft_delete_note(&self, note_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut notes = self.notes.write().await;
        match notes.get_mut(&note_id) {
            Some(note) if note.user_id == user_id => {
                note.is_deleted = true;
                note.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn list_notes(&self, user_id: Uuid, query: Option<&str>) -> Result<Vec<Note>> {
        let notes = self.notes.read().await;
        let mut listed: Vec<Note> = notes
            .values()
            .filter(|note| note.user_id == user_id && !note.is_deleted)
            .filter(|note| query.map_or(true, |q| note.matches(q)))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use docchat_core::Role;

    #[tokio::test]
    async fn should_reject_duplicate_username() {
        let store = MemoryRecordStore::new();
        store.create_user("alice", "hash").await.unwrap();

        let err = store.create_user("alice", "other").await.unwrap_err();

        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::UsernameTaken("alice".to_string()))
        );
    }

    #[tokio::test]
    async fn should_find_user_by_username() {
        let store = MemoryRecordStore::new();
        let created = store.create_user("bob", "hash").await.unwrap();

        let found = store.find_user_by_username("bob").await.unwrap().unwrap();

        assert_eq!(found.id, created.id);
        assert!(store.find_user_by_username("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_hide_soft_deleted_documents() {
        let store = MemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let kept = Document::new(owner, "kept.txt", "documents/kept.txt");
        let removed = Document::new(owner, "removed.txt", "documents/removed.txt");
        store.insert_document(&kept).await.unwrap();
        store.insert_document(&removed).await.unwrap();

        assert!(store.soft_delete_document(removed.id, owner).await.unwrap());

        let active = store.active_documents(owner).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, kept.id);
        let found = store
            .find_document_for_user(removed.id, owner)
            .await
            .unwrap()
            .unwrap();
        assert!(found.is_deleted);
    }

    #[tokio::test]
    async fn should_not_delete_document_of_other_user() {
        let store = MemoryRecordStore::new();
        let document = Document::new(Uuid::new_v4(), "a.pdf", "documents/a.pdf");
        store.insert_document(&document).await.unwrap();

        let intruder = Uuid::new_v4();

        assert!(!store.soft_delete_document(document.id, intruder).await.unwrap());
        assert!(store
            .find_document_for_user(document.id, intruder)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn should_filter_selection_to_active_owned_ids() {
        let store = MemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let active = Document::new(owner, "a.txt", "a");
        let deleted = Document::new(owner, "b.txt", "b");
        let foreign = Document::new(Uuid::new_v4(), "c.txt", "c");
        for document in [&active, &deleted, &foreign] {
            store.insert_document(document).await.unwrap();
        }
        store.soft_delete_document(deleted.id, owner).await.unwrap();

        let ids = store
            .filter_active_ids(owner, &[active.id, deleted.id, foreign.id, Uuid::new_v4()])
            .await
            .unwrap();

        assert_eq!(ids, vec![active.id]);
    }

    #[tokio::test]
    async fn should_mark_document_indexed() {
        let store = MemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let document = Document::new(owner, "a.txt", "a");
        store.insert_document(&document).await.unwrap();

        store.mark_indexed(document.id).await.unwrap();

        let found = store.find_document_for_user(document.id, owner).await.unwrap().unwrap();
        assert!(found.is_indexed);
    }

    #[tokio::test]
    async fn should_return_messages_since_cutoff_in_order() {
        let store = MemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let mut old = ChatMessage::new(owner, Role::User, "old");
        old.created_at = Utc::now() - Duration::hours(30);
        let mut first = ChatMessage::new(owner, Role::User, "first");
        first.created_at = Utc::now() - Duration::minutes(5);
        let second = ChatMessage::new(owner, Role::Assistant, "second");
        let other = ChatMessage::new(Uuid::new_v4(), Role::User, "other");
        for message in [&second, &old, &other, &first] {
            store.append_message(message).await.unwrap();
        }

        let recent = store
            .messages_since(owner, Utc::now() - Duration::hours(24))
            .await
            .unwrap();

        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn should_clear_only_own_messages() {
        let store = MemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        store
            .append_message(&ChatMessage::new(owner, Role::User, "mine"))
            .await
            .unwrap();
        store
            .append_message(&ChatMessage::new(other, Role::User, "theirs"))
            .await
            .unwrap();

        assert_eq!(store.clear_messages(owner).await.unwrap(), 1);

        let since = Utc::now() - Duration::hours(1);
        assert!(store.messages_since(owner, since).await.unwrap().is_empty());
        assert_eq!(store.messages_since(other, since).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_search_notes_by_title_or_content() {
        let store = MemoryRecordStore::new();
        let owner = Uuid::new_v4();
        store.create_note(owner, "Rust ownership", "borrowing").await.unwrap();
        store.create_note(owner, "Recipes", "Pasta with RUST-coloured sauce").await.unwrap();
        store.create_note(owner, "Travel", "Lisbon").await.unwrap();
        store.create_note(Uuid::new_v4(), "Rust", "someone else").await.unwrap();

        let found = store.list_notes(owner, Some("rust")).await.unwrap();
        let all = store.list_notes(owner, None).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn should_list_recently_updated_notes_first() {
        let store = MemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let first = store.create_note(owner, "First", "").await.unwrap();
        let second = store.create_note(owner, "Second", "").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
            .update_note(first.id, owner, "First (edited)", "now longer")
            .await
            .unwrap();

        let listed = store.list_notes(owner, None).await.unwrap();
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[tokio::test]
    async fn should_not_update_deleted_note() {
        let store = MemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let note = store.create_note(owner, "Draft", "").await.unwrap();
        assert!(store.soft_delete_note(note.id, owner).await.unwrap());

        let updated = store.update_note(note.id, owner, "Again", "").await.unwrap();

        assert!(updated.is_none());
        assert!(store.find_active_note(note.id, owner).await.unwrap().is_none());
        assert!(store.find_note_for_user(note.id, owner).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn should_allow_deleting_note_twice() {
        let store = MemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let note = store.create_note(owner, "Once", "").await.unwrap();

        assert!(store.soft_delete_note(note.id, owner).await.unwrap());
        assert!(store.soft_delete_note(note.id, owner).await.unwrap());
        assert!(!store.soft_delete_note(note.id, Uuid::new_v4()).await.unwrap());
    }
}
