use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

use crate::parser::{DocumentParser, IngestError};

/// Paragraphs and pages are separated by a blank line in extracted text.
const BLOCK_SEPARATOR: &str = "\n\n";

pub struct TextParser;

#[async_trait]
impl DocumentParser for TextParser {
    fn extensions(&self) -> &[&'static str] {
        &["txt"]
    }

    /// UTF-8, falling back to Latin-1 where every byte maps to one char.
    fn parse_bytes(&self, bytes: &[u8]) -> Result<String, IngestError> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

pub struct PdfParser;

#[async_trait]
impl DocumentParser for PdfParser {
    fn extensions(&self) -> &[&'static str] {
        &["pdf"]
    }

    fn parse_bytes(&self, bytes: &[u8]) -> Result<String, IngestError> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| IngestError::malformed("pdf", e))?;

        // pdf-extract separates pages with form feeds
        let pages: Vec<&str> = text
            .split('\u{c}')
            .map(str::trim)
            .filter(|page| !page.is_empty())
            .collect();
        Ok(pages.join(BLOCK_SEPARATOR))
    }
}

pub struct DocxParser;

impl DocxParser {
    fn document_xml(bytes: &[u8]) -> Result<String, IngestError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| IngestError::malformed("docx", e))?;
        let mut entry = archive
            .by_name("word/document.xml")
            .map_err(|e| IngestError::malformed("docx", e))?;
        let mut xml = String::new();
        entry
            .read_to_string(&mut xml)
            .map_err(|e| IngestError::malformed("docx", e))?;
        Ok(xml)
    }

    /// Collects the text runs of every `w:p` paragraph.
    fn paragraphs(xml: &str) -> Result<Vec<String>, IngestError> {
        let mut reader = Reader::from_str(xml);
        let mut paragraphs = Vec::new();
        let mut current = String::new();
        let mut in_text = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"w:p" => current.clear(),
                    b"w:t" => in_text = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"w:tab" => current.push('\t'),
                    b"w:br" | b"w:cr" => current.push('\n'),
                    b"w:p" => paragraphs.push(String::new()),
                    _ => {}
                },
                Ok(Event::Text(t)) if in_text => {
                    let text = t.unescape().map_err(|e| IngestError::malformed("docx", e))?;
                    current.push_str(&text);
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"w:t" => in_text = false,
                    b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(IngestError::malformed("docx", e)),
            }
        }

        Ok(paragraphs)
    }
}

#[async_trait]
impl DocumentParser for DocxParser {
    fn extensions(&self) -> &[&'static str] {
        &["docx"]
    }

    fn parse_bytes(&self, bytes: &[u8]) -> Result<String, IngestError> {
        let xml = Self::document_xml(bytes)?;
        let paragraphs: Vec<String> = Self::paragraphs(&xml)?
            .into_iter()
            .filter(|paragraph| !paragraph.trim().is_empty())
            .collect();
        Ok(paragraphs.join(BLOCK_SEPARATOR))
    }
}
