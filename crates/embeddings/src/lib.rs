pub mod chunker;
pub mod fallback;
pub mod gemini;

pub use chunker::{ChunkConfig, TextChunk, TextChunker};
pub use docchat_core::config::EmbeddingConfig;
pub use fallback::FallbackEmbeddingProvider;
pub use gemini::{GeminiEmbeddingClient, GeminiEmbeddingConfig};

use anyhow::Result;

type EmbedFuture<'a> =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Vec<f32>>>> + Send + 'a>>;

pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, texts: Vec<String>) -> EmbedFuture<'_>;
    fn dimension(&self) -> usize;
}

impl EmbeddingProvider for GeminiEmbeddingClient {
    fn embed(&self, texts: Vec<String>) -> EmbedFuture<'_> {
        Box::pin(self.embed(texts))
    }
    fn dimension(&self) -> usize {
        self.dimensions()
    }
}

impl EmbeddingProvider for FallbackEmbeddingProvider {
    fn embed(&self, texts: Vec<String>) -> EmbedFuture<'_> {
        Box::pin(self.embed(texts))
    }
    fn dimension(&self) -> usize {
        self.embedding_dimension()
    }
}

pub fn create_embedding_provider(
    cfg: &EmbeddingConfig,
    api_key: &str,
) -> Result<Box<dyn EmbeddingProvider>> {
    match cfg.provider.as_str() {
        "gemini" => {
            let defaults = GeminiEmbeddingConfig::default();
            let gemini_cfg = GeminiEmbeddingConfig {
                api_key: api_key.to_string(),
                model: cfg.model.clone().unwrap_or(defaults.model.clone()),
                dimensions: cfg.dimensions.unwrap_or(defaults.dimensions),
                ..defaults
            };
            tracing::info!("Using Gemini embeddings model {}", gemini_cfg.model);
            Ok(Box::new(GeminiEmbeddingClient::new(gemini_cfg)?))
        }
        other => {
            if other != "fallback" {
                tracing::warn!(
                    "Unknown embedding provider '{}', using offline fallback",
                    other
                );
            }
            let provider = match cfg.dimensions {
                Some(dim) => FallbackEmbeddingProvider::new(dim),
                None => FallbackEmbeddingProvider::with_standard_dimension(),
            };
            Ok(Box::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str, dimensions: Option<usize>) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: provider.to_string(),
            model: None,
            dimensions,
        }
    }

    #[test]
    fn should_create_gemini_provider_with_configured_dimensions() {
        let provider = create_embedding_provider(&config("gemini", Some(256)), "key").unwrap();
        assert_eq!(provider.dimension(), 256);
    }

    #[test]
    fn should_default_gemini_dimensions() {
        let provider = create_embedding_provider(&config("gemini", None), "key").unwrap();
        assert_eq!(provider.dimension(), 768);
    }

    #[tokio::test]
    async fn should_fall_back_for_unknown_provider() {
        let provider = create_embedding_provider(&config("sentence-transformers", None), "").unwrap();
        assert_eq!(provider.dimension(), 384);

        let vectors = provider.embed(vec!["hello".to_string()]).await.unwrap();
        assert_eq!(vectors[0].len(), 384);
    }
}
