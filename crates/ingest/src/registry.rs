use crate::formats::{DocxParser, PdfParser, TextParser};
use crate::parser::{DocumentParser, IngestError};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub type BoxedParser = Box<dyn DocumentParser>;

/// Maps lowercase file extensions to the parser that handles them.
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<BoxedParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Registry with the PDF, DOCX and plain-text parsers.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Box::new(PdfParser))?;
        registry.register(Box::new(DocxParser))?;
        registry.register(Box::new(TextParser))?;
        Ok(registry)
    }

    pub fn register(&mut self, parser: BoxedParser) -> Result<()> {
        let extensions: Vec<String> = parser
            .extensions()
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect();

        if let Some(taken) = extensions.iter().find(|ext| self.parsers.contains_key(*ext)) {
            anyhow::bail!("A parser for '.{}' is already registered", taken);
        }

        let parser = Arc::new(parser);
        for ext in extensions {
            self.parsers.insert(ext, Arc::clone(&parser));
        }
        Ok(())
    }

    pub fn get_parser(&self, extension: &str) -> Option<Arc<BoxedParser>> {
        self.parsers.get(&extension.to_lowercase()).cloned()
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.parsers.keys().cloned().collect();
        extensions.sort();
        extensions
    }

    pub fn is_supported(&self, extension: &str) -> bool {
        self.parsers.contains_key(&extension.to_lowercase())
    }

    pub async fn parse_file(&self, path: &Path, extension: &str) -> Result<String, IngestError> {
        let parser = self
            .get_parser(extension)
            .ok_or_else(|| IngestError::UnsupportedType(extension.to_string()))?;
        debug!("Parsing {} as .{}", path.display(), extension);
        parser.parse_file(path).await
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
