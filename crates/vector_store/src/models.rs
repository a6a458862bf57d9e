use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ownership and position of a chunk within its source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub document_name: String,
    pub chunk_index: usize,
}

/// A stored chunk with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    pub id: Uuid,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    pub fn new(metadata: ChunkMetadata, content: String, embedding: Vec<f32>) -> Self {
        Self {
            content,
            embedding,
            metadata,
        }
    }

    pub fn into_record(self) -> ChunkRecord {
        ChunkRecord {
            id: Uuid::new_v4(),
            content: self.content,
            embedding: self.embedding,
            metadata: self.metadata,
            created_at: Utc::now(),
        }
    }
}

/// Restricts a search to one user's chunks from the selected documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub user_id: Uuid,
    pub document_ids: Vec<Uuid>,
}

impl SearchFilter {
    pub fn new(user_id: Uuid, document_ids: Vec<Uuid>) -> Self {
        Self {
            user_id,
            document_ids,
        }
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        metadata.user_id == self.user_id && self.document_ids.contains(&metadata.document_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub record: ChunkRecord,
    pub similarity: f32,
}

impl SearchResult {
    pub fn new(record: ChunkRecord, similarity: f32) -> Self {
        Self { record, similarity }
    }
}
