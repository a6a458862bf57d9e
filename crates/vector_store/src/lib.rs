pub mod memory;
pub mod models;
pub mod store;

use anyhow::Result;
use uuid::Uuid;

pub use memory::InMemoryVectorStore;
pub use models::{ChunkMetadata, ChunkRecord, DocumentChunk, SearchFilter, SearchResult};
pub use store::PgVectorStore;

pub enum AnyVectorStore {
    Postgres(PgVectorStore),
    InMemory(InMemoryVectorStore),
}

impl AnyVectorStore {
    pub async fn insert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<Vec<ChunkRecord>> {
        match self {
            AnyVectorStore::Postgres(store) => store.insert_chunks(chunks).await,
            AnyVectorStore::InMemory(store) => store.insert_chunks(chunks).await,
        }
    }

    pub async fn search_similar(
        &self,
        query_embedding: Vec<f32>,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        match self {
            AnyVectorStore::Postgres(store) => {
                store.search_similar(query_embedding, filter, limit).await
            }
            AnyVectorStore::InMemory(store) => {
                store.search_similar(query_embedding, filter, limit).await
            }
        }
    }

    pub async fn delete_document(&self, document_id: Uuid, user_id: Uuid) -> Result<u64> {
        match self {
            AnyVectorStore::Postgres(store) => store.delete_document(document_id, user_id).await,
            AnyVectorStore::InMemory(store) => store.delete_document(document_id, user_id).await,
        }
    }

    pub async fn count(&self) -> Result<i64> {
        match self {
            AnyVectorStore::Postgres(store) => store.count().await,
            AnyVectorStore::InMemory(store) => store.count().await,
        }
    }
}
