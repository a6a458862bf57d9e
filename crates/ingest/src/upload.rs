use chrono::{DateTime, Utc};
use docchat_core::config::UploadConfig;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Lowercase text after the last `.`, or empty when the name has no dot.
pub fn file_extension(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("File '{name}' has an unsupported type.")]
    UnsupportedType { name: String },

    #[error("File '{name}' exceeds the {limit_mb}MB limit.")]
    TooLarge { name: String, limit_mb: u64 },
}

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn validate(&self, name: &str, size: u64) -> Result<String, UploadRejection> {
        let extension = file_extension(name);
        if !self.allowed_extensions.iter().any(|ext| ext == &extension) {
            return Err(UploadRejection::UnsupportedType {
                name: name.to_string(),
            });
        }
        if size > self.max_bytes {
            return Err(UploadRejection::TooLarge {
                name: name.to_string(),
                limit_mb: self.max_bytes / (1024 * 1024),
            });
        }
        Ok(extension)
    }
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

/// Relative storage path `documents/YYYY/MM/DD/{uuid}_{name}` for an upload.
pub fn storage_path(now: DateTime<Utc>, name: &str) -> PathBuf {
    let sanitized: String = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    PathBuf::from("documents")
        .join(now.format("%Y/%m/%d").to_string())
        .join(format!("{}_{}", Uuid::new_v4().simple(), sanitized))
}
