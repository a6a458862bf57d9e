use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GeminiEmbeddingConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Base delay of the exponential backoff between attempts.
    pub retry_delay: Duration,
}

impl Default for GeminiEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "text-embedding-004".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            dimensions: 768,
            timeout_secs: 30,
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: Content,
    task_type: &'static str,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

/// Client for the Gemini `batchEmbedContents` endpoint.
pub struct GeminiEmbeddingClient {
    config: GeminiEmbeddingConfig,
    client: Client,
}

impl GeminiEmbeddingClient {
    pub fn new(config: GeminiEmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.try_embed(&texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    tracing::warn!("Gemini embedding attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        let delay = self.config.retry_delay * 2_u32.pow(attempt);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Gemini embedding failed")))
    }

    async fn try_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = format!("models/{}", self.config.model);
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: model.clone(),
                    content: Content {
                        parts: vec![Part { text: text.clone() }],
                    },
                    task_type: "RETRIEVAL_DOCUMENT",
                    output_dimensionality: self.config.dimensions,
                })
                .collect(),
        };

        let response = self
            .client
            .post(format!(
                "{}/models/{}:batchEmbedContents",
                self.config.base_url, self.config.model
            ))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Gemini embedding API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Gemini embedding API returned error {}: {}",
                status,
                error_text
            ));
        }

        let embed_response: BatchEmbedResponse = response
            .json()
            .await
            .context("Failed to parse Gemini embedding response")?;

        if embed_response.embeddings.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Gemini returned {} embeddings for {} texts",
                embed_response.embeddings.len(),
                texts.len()
            ));
        }

        Ok(embed_response
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect())
    }
}
