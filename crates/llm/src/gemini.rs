use crate::models::{GenerateContentRequest, GenerateContentResponse, ModelConfig, StreamEvent};
use anyhow::{Context, Result};
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use std::pin::Pin;
use std::time::Duration;
use tracing::{error, info, warn};

pub type EventStream<'a> = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send + 'a>>;

pub struct GeminiClient {
    client: Client,
    config: ModelConfig,
}

impl GeminiClient {
    pub fn new(config: ModelConfig) -> Result<Self> {
        info!("Initializing GeminiClient");
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Sends a single-turn prompt. The first attempt uses the primary model,
    /// retries use the fallback model with exponential backoff.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.config.max_retries {
            let model = self.model_for_attempt(attempt);

            match self.try_generate(prompt, model).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!("Gemini request to {} failed: {}", model, e);
                    last_error = Some(e);
                    attempt += 1;

                    if attempt <= self.config.max_retries {
                        tokio::time::sleep(self.backoff(attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Gemini request was not attempted")))
    }

    /// Streams the answer as it is generated. Retries only cover opening the
    /// stream; errors after the first chunk are yielded to the caller.
    pub async fn stream_generate(&self, prompt: &str) -> Result<EventStream<'_>> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.config.max_retries {
            let model = self.model_for_attempt(attempt);

            match self.try_stream_generate(prompt, model).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    warn!("Gemini stream to {} failed: {}", model, e);
                    last_error = Some(e);
                    attempt += 1;

                    if attempt <= self.config.max_retries {
                        tokio::time::sleep(self.backoff(attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Gemini stream was not attempted")))
    }

    fn model_for_attempt(&self, attempt: u32) -> &str {
        if attempt == 0 {
            &self.config.primary_model
        } else {
            &self.config.fallback_model
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config.retry_delay * 2_u32.pow(attempt.saturating_sub(1))
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.config.base_url, model, method)
    }

    async fn send(&self, url: &str, prompt: &str) -> Result<reqwest::Response> {
        let request = GenerateContentRequest::from_prompt(prompt, &self.config);
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini send error: {:?}", e);
                anyhow::anyhow!("Failed to send request to Gemini: {}", e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Gemini API returned error {}: {}",
                status,
                error_text
            ));
        }

        Ok(response)
    }

    async fn try_generate(&self, prompt: &str, model: &str) -> Result<String> {
        info!("Sending request to Gemini model: {}", model);
        let response = self
            .send(&self.endpoint(model, "generateContent"), prompt)
            .await?;

        let body: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        Ok(body.text())
    }

    async fn try_stream_generate(&self, prompt: &str, model: &str) -> Result<EventStream<'_>> {
        info!("Opening Gemini stream for model: {}", model);
        let url = format!("{}?alt=sse", self.endpoint(model, "streamGenerateContent"));
        let response = self.send(&url, prompt).await?;

        let mut bytes = Box::pin(response.bytes_stream());

        Ok(Box::pin(async_stream::stream! {
            yield Ok(StreamEvent::MessageStart);

            let mut buffer = String::new();
            loop {
                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));
                        while let Some(newline) = buffer.find('\n') {
                            let line: String = buffer.drain(..=newline).collect();
                            if let Some(event) = parse_sse_line(line.trim()) {
                                yield event;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        yield Err(anyhow::anyhow!("Stream error: {}", e));
                        break;
                    }
                    None => {
                        if let Some(event) = parse_sse_line(buffer.trim()) {
                            yield event;
                        }
                        yield Ok(StreamEvent::MessageStop);
                        break;
                    }
                }
            }
        }))
    }
}

/// Turns one `data: {...}` line into a content delta. Other SSE lines and
/// chunks without text are skipped.
fn parse_sse_line(line: &str) -> Option<Result<StreamEvent>> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str::<GenerateContentResponse>(data) {
        Ok(chunk) => {
            let text = chunk.text();
            if text.is_empty() {
                None
            } else {
                Some(Ok(StreamEvent::ContentDelta { text }))
            }
        }
        Err(e) => {
            warn!("Failed to parse Gemini SSE chunk: {}", e);
            None
        }
    }
}
