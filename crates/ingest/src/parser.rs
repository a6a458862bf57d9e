use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} document: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },
}

impl IngestError {
    pub fn malformed(format: &'static str, message: impl ToString) -> Self {
        IngestError::Malformed {
            format,
            message: message.to_string(),
        }
    }
}

/// Extracts plain text from one document format.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Lowercase extensions handled by this parser, without the dot.
    fn extensions(&self) -> &[&'static str];

    fn parse_bytes(&self, bytes: &[u8]) -> Result<String, IngestError>;

    async fn parse_file(&self, path: &Path) -> Result<String, IngestError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| IngestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.parse_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperParser;

    #[async_trait]
    impl DocumentParser for UpperParser {
        fn extensions(&self) -> &[&'static str] {
            &["up"]
        }

        fn parse_bytes(&self, bytes: &[u8]) -> Result<String, IngestError> {
            Ok(String::from_utf8_lossy(bytes).to_uppercase())
        }
    }

    #[tokio::test]
    async fn should_parse_file_through_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.up");
        tokio::fs::write(&path, "hello").await.unwrap();

        let text = UpperParser.parse_file(&path).await.unwrap();

        assert_eq!(text, "HELLO");
    }

    #[tokio::test]
    async fn should_report_missing_file_as_io_error() {
        let err = UpperParser
            .parse_file(Path::new("/non/existent/file.up"))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Io { .. }));
        assert!(err.to_string().contains("/non/existent/file.up"));
    }

    #[test]
    fn should_format_error_messages() {
        assert_eq!(
            IngestError::UnsupportedType("exe".to_string()).to_string(),
            "Unsupported file type: exe"
        );
        assert_eq!(
            IngestError::malformed("docx", "missing body").to_string(),
            "Failed to parse docx document: missing body"
        );
    }
}
