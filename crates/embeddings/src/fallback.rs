use anyhow::Result;

/// Offline embeddings provider based on feature hashing.
///
/// Every lowercase alphanumeric token is hashed into one of `embedding_dim`
/// buckets and the resulting count vector is L2-normalized, so texts that
/// share vocabulary get a positive cosine similarity. Used for development
/// and tests when no embedding API is configured.
pub struct FallbackEmbeddingProvider {
    embedding_dim: usize,
}

impl FallbackEmbeddingProvider {
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            embedding_dim: embedding_dim.max(1),
        }
    }

    /// Same width as all-MiniLM-L6-v2 vectors.
    pub fn with_standard_dimension() -> Self {
        Self::new(384)
    }

    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    pub fn embedding_dimension(&self) -> usize {
        self.embedding_dim
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.embedding_dim];

        for token in tokens(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.embedding_dim as u64) as usize;
            // one hash bit picks the sign to keep collisions from piling up
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        embedding
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}
