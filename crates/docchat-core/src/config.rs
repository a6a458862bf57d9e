use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::alerts::AlertTimings;

/// Placeholder shipped in sample `.env` files; treated the same as a missing key.
pub const PLACEHOLDER_API_KEY: &str = "your-google-api-key-here";

/// URL scheme selecting the in-process backends instead of Postgres/Redis.
pub const MEMORY_URL: &str = "memory://";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            debug: false,
        }
    }
}

impl ServerConfig {
    pub fn with_overrides(&self, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let debug = lookup("DEBUG")
            .map(|value| parse_bool(&value))
            .unwrap_or(self.debug);
        let bind = lookup("BIND_ADDRESS").unwrap_or_else(|| self.bind.clone());
        Self { bind, debug }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: MEMORY_URL.to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn with_overrides(&self, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup("DATABASE_URL").unwrap_or_else(|| self.url.clone());
        Self {
            url,
            max_connections: self.max_connections,
        }
    }

    pub fn is_memory(&self) -> bool {
        self.url.starts_with(MEMORY_URL)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub session_ttl_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: MEMORY_URL.to_string(),
            // two weeks, the usual web session lifetime
            session_ttl_seconds: 1_209_600,
        }
    }
}

impl RedisConfig {
    pub fn with_overrides(&self, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup("REDIS_URL").unwrap_or_else(|| self.url.clone());
        Self {
            url,
            session_ttl_seconds: self.session_ttl_seconds,
        }
    }

    pub fn is_memory(&self) -> bool {
        self.url.starts_with(MEMORY_URL)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: Option<String>,
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "fallback".to_string(),
            model: None,
            dimensions: Some(384),
        }
    }
}

impl EmbeddingConfig {
    pub fn with_overrides(&self, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let provider = lookup("EMBEDDING_PROVIDER").unwrap_or_else(|| self.provider.clone());
        Self {
            provider,
            model: self.model.clone(),
            dimensions: self.dimensions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub primary: String,
    pub fallback: String,
    pub api_key: String,
    pub base_url: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            primary: "gemini-2.5-flash".to_string(),
            fallback: "gemini-2.0-flash".to_string(),
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_retries: 3,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn with_overrides(&self, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let primary = lookup("LLM_PRIMARY_MODEL").unwrap_or_else(|| self.primary.clone());
        let fallback = lookup("LLM_FALLBACK_MODEL").unwrap_or_else(|| self.fallback.clone());
        let api_key = lookup("GOOGLE_API_KEY").unwrap_or_else(|| self.api_key.clone());
        Self {
            primary,
            fallback,
            api_key,
            base_url: self.base_url.clone(),
            max_retries: self.max_retries,
            timeout_secs: self.timeout_secs,
        }
    }

    /// False when the key is empty or still the sample placeholder.
    pub fn has_api_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != PLACEHOLDER_API_KEY
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub history_hours: i64,
    pub history_max_messages: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 5,
            history_hours: 24,
            history_max_messages: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub media_dir: String,
    pub max_upload_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            media_dir: "./media".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_extensions: vec!["pdf".to_string(), "txt".to_string(), "docx".to_string()],
        }
    }
}

impl UploadConfig {
    pub fn with_overrides(&self, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let media_dir = lookup("MEDIA_ROOT").unwrap_or_else(|| self.media_dir.clone());
        Self {
            media_dir,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub auto_dismiss_ms: u64,
    pub manual_fade_ms: u64,
    pub auto_fade_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        let timings = AlertTimings::default();
        Self {
            auto_dismiss_ms: timings.auto_dismiss.as_millis() as u64,
            manual_fade_ms: timings.manual_fade.as_millis() as u64,
            auto_fade_ms: timings.auto_fade.as_millis() as u64,
        }
    }
}

impl AlertConfig {
    pub fn timings(&self) -> AlertTimings {
        AlertTimings {
            auto_dismiss: Duration::from_millis(self.auto_dismiss_ms),
            manual_fade: Duration::from_millis(self.manual_fade_ms),
            auto_fade: Duration::from_millis(self.auto_fade_ms),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Reads `.env`, then the TOML file at `CONFIG_PATH`, then applies
    /// environment overrides. A missing file yields the development defaults.
    pub fn load_from_env() -> anyhow::Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }

        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| Self::default_config_path());
        let path = Path::new(&config_path);
        let config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::warn!(
                "Config file {} not found, using development defaults",
                config_path
            );
            Self::default()
        };

        Ok(config.with_env_overrides())
    }

    pub fn default_config_path() -> String {
        "./config.toml".to_string()
    }

    pub fn with_env_overrides(&self) -> Self {
        self.with_overrides(|key| env::var(key).ok())
    }

    pub fn with_overrides(&self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            server: self.server.with_overrides(&lookup),
            database: self.database.with_overrides(&lookup),
            redis: self.redis.with_overrides(&lookup),
            embedding: self.embedding.with_overrides(&lookup),
            llm: self.llm.with_overrides(&lookup),
            rag: self.rag.clone(),
            uploads: self.uploads.with_overrides(&lookup),
            alerts: self.alerts.clone(),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
