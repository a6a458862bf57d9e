use anyhow::Result;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{ChunkRecord, DocumentChunk, SearchFilter, SearchResult};

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (a_norm, b_norm) = (l2_norm(a), l2_norm(b));
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

/// Process-local chunk index for development and tests.
#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<Vec<ChunkRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_chunks(&self, chunks: Vec<DocumentChunk>) -> Result<Vec<ChunkRecord>> {
        let new_records: Vec<ChunkRecord> =
            chunks.into_iter().map(DocumentChunk::into_record).collect();
        self.records.write().await.extend(new_records.iter().cloned());
        Ok(new_records)
    }

    pub async fn search_similar(
        &self,
        query_embedding: Vec<f32>,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let records = self.records.read().await;
        let mut results: Vec<SearchResult> = records
            .iter()
            .filter(|record| filter.matches(&record.metadata))
            .map(|record| {
                let similarity = cosine_similarity(&query_embedding, &record.embedding);
                SearchResult::new(record.clone(), similarity)
            })
            .collect();

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(limit);
        Ok(results)
    }

    pub async fn delete_document(&self, document_id: Uuid, user_id: Uuid) -> Result<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| {
            !(record.metadata.document_id == document_id && record.metadata.user_id == user_id)
        });
        Ok((before - records.len()) as u64)
    }

    pub async fn count(&self) -> Result<i64> {
        Ok(self.records.read().await.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn chunk(user_id: Uuid, document_id: Uuid, index: usize, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk::new(
            ChunkMetadata {
                user_id,
                document_id,
                document_name: "notes.txt".to_string(),
                chunk_index: index,
            },
            format!("chunk {index}"),
            embedding,
        )
    }

    #[test]
    fn should_compute_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn should_rank_results_by_similarity() {
        let store = InMemoryVectorStore::new();
        let user = Uuid::new_v4();
        let doc = Uuid::new_v4();
        store
            .insert_chunks(vec![
                chunk(user, doc, 0, vec![0.0, 1.0]),
                chunk(user, doc, 1, vec![1.0, 0.1]),
                chunk(user, doc, 2, vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let results = store
            .search_similar(vec![1.0, 0.0], &SearchFilter::new(user, vec![doc]), 2)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.metadata.chunk_index, 1);
        assert_eq!(results[1].record.metadata.chunk_index, 2);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[tokio::test]
    async fn should_only_search_owned_and_selected_documents() {
        let store = InMemoryVectorStore::new();
        let owner = Uuid::new_v4();
        let other_user = Uuid::new_v4();
        let selected = Uuid::new_v4();
        let unselected = Uuid::new_v4();
        store
            .insert_chunks(vec![
                chunk(owner, selected, 0, vec![1.0, 0.0]),
                chunk(owner, unselected, 0, vec![1.0, 0.0]),
                chunk(other_user, selected, 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store
            .search_similar(vec![1.0, 0.0], &SearchFilter::new(owner, vec![selected]), 5)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.metadata.user_id, owner);
        assert_eq!(results[0].record.metadata.document_id, selected);
    }

    #[tokio::test]
    async fn should_delete_only_matching_document_of_owner() {
        let store = InMemoryVectorStore::new();
        let owner = Uuid::new_v4();
        let doc = Uuid::new_v4();
        let other_doc = Uuid::new_v4();
        store
            .insert_chunks(vec![
                chunk(owner, doc, 0, vec![1.0]),
                chunk(owner, doc, 1, vec![1.0]),
                chunk(owner, other_doc, 0, vec![1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_document(doc, Uuid::new_v4()).await.unwrap(), 0);
        assert_eq!(store.delete_document(doc, owner).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
