use docchat_core::config::LlmConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub primary_model: String,
    pub fallback_model: String,
    pub api_key: String,
    pub base_url: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            primary_model: "gemini-2.5-flash".to_string(),
            fallback_model: "gemini-2.0-flash".to_string(),
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_output_tokens: 2048,
            temperature: 0.2,
            timeout_secs: 60,
            max_retries: 1,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&LlmConfig> for ModelConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            primary_model: config.primary.clone(),
            fallback_model: config.fallback.clone(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEvent {
    MessageStart,
    ContentDelta { text: String },
    MessageStop,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    pub fn from_prompt(prompt: &str, config: &ModelConfig) -> Self {
        Self {
            contents: vec![Content::user(prompt)],
            generation_config: GenerationConfig {
                max_output_tokens: config.max_output_tokens,
                temperature: config.temperature,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts concatenated. Empty when the model
    /// returned no candidates.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_create_default_model_config() {
        let config = ModelConfig::default();
        assert_eq!(config.primary_model, "gemini-2.5-flash");
        assert_eq!(config.fallback_model, "gemini-2.0-flash");
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn should_build_model_config_from_llm_config() {
        let llm = LlmConfig {
            primary: "gemini-2.5-pro".to_string(),
            api_key: "secret".to_string(), // pragma: allowlist secret
            base_url: "http://localhost:1234/".to_string(),
            max_retries: 4,
            ..LlmConfig::default()
        };

        let config = ModelConfig::from(&llm);

        assert_eq!(config.primary_model, "gemini-2.5-pro");
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.base_url, "http://localhost:1234");
        assert_eq!(config.max_retries, 4);
    }

    #[test]
    fn should_serialize_generate_request() {
        let request = GenerateContentRequest::from_prompt("Hello", &ModelConfig::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn should_concatenate_candidate_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello "},{"text":"world"}]}}]}"#,
        )
        .unwrap();

        assert_eq!(response.text(), "Hello world");
    }

    #[test]
    fn should_return_empty_text_without_candidates() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text(), "");

        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(blocked.text(), "");
    }
}
