/// Sentence endings the chunker prefers to cut after, in priority order.
const SENTENCE_BREAKS: [&str; 4] = [". ", ".\n", "! ", "? "];

/// A text chunk with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    /// Character offsets into the source text, end exclusive.
    pub start_pos: usize,
    pub end_pos: usize,
    pub chunk_id: usize,
}

/// Configuration for text chunking, in characters
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub overlap_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap_size: 50,
        }
    }
}

/// Splits text into overlapping character windows, snapping each window
/// back to a sentence ending when one falls in its second half.
pub struct TextChunker {
    config: ChunkConfig,
}

impl TextChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn chunk_text(&self, text: &str) -> Vec<TextChunk> {
        if text.is_empty() || self.config.chunk_size == 0 {
            return vec![];
        }

        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let size = self.config.chunk_size;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total {
            let mut end = (start + size).min(total);

            if end < total {
                let window: String = chars[start..end].iter().collect();
                if let Some(offset) = sentence_break(&window, size / 2) {
                    end = start + offset;
                }
            }

            let raw: String = chars[start..end].iter().collect();
            let content = raw.trim();
            if !content.is_empty() {
                chunks.push(TextChunk {
                    content: content.to_string(),
                    start_pos: start,
                    end_pos: end,
                    chunk_id: chunks.len(),
                });
            }

            if end >= total {
                break;
            }

            let next = end.saturating_sub(self.config.overlap_size);
            start = if next > start { next } else { end };
        }

        chunks
    }

    pub fn chunk_count(&self, text: &str) -> usize {
        self.chunk_text(text).len()
    }
}

/// Character offset just past the preferred sentence break in `window`,
/// considering only breaks that start beyond `min_pos`.
fn sentence_break(window: &str, min_pos: usize) -> Option<usize> {
    for mark in SENTENCE_BREAKS {
        if let Some(byte_pos) = window.rfind(mark) {
            let pos = window[..byte_pos].chars().count();
            if pos > min_pos {
                return Some(pos + mark.chars().count());
            }
        }
    }
    None
}
