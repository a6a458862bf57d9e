//! Prompt assembly for document-grounded answers.

pub const NO_HISTORY: &str = "No previous history.";

/// Separator placed between retrieved excerpts.
pub const EXCERPT_SEPARATOR: &str = "\n\n---\n\n";

pub struct RagPrompt<'a> {
    pub question: &'a str,
    pub excerpts: &'a [String],
    /// Pre-formatted conversation, `None` when there is none.
    pub history: Option<&'a str>,
}

impl RagPrompt<'_> {
    pub fn render(&self) -> String {
        let history = self.history.unwrap_or(NO_HISTORY);
        let context = self.excerpts.join(EXCERPT_SEPARATOR);

        format!(
            "You are a helpful assistant answering questions based on the provided documents.\n\n\
             Recent conversation:\n{history}\n\n\
             Relevant document excerpts:\n{context}\n\n\
             User question: {question}\n\n\
             Please provide a clear, accurate answer based on the document excerpts above. \
             If the documents don't contain enough information to answer the question, say so clearly.\n\n\
             Answer:",
            question = self.question,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_render_prompt_with_history_and_excerpts() {
        let excerpts = vec!["First excerpt.".to_string(), "Second excerpt.".to_string()];
        let prompt = RagPrompt {
            question: "What is covered?",
            excerpts: &excerpts,
            history: Some("User: hi\nAssistant: hello"),
        };

        let expected = "You are a helpful assistant answering questions based on the provided documents.\n\n\
Recent conversation:\nUser: hi\nAssistant: hello\n\n\
Relevant document excerpts:\nFirst excerpt.\n\n---\n\nSecond excerpt.\n\n\
User question: What is covered?\n\n\
Please provide a clear, accurate answer based on the document excerpts above. If the documents don't contain enough information to answer the question, say so clearly.\n\n\
Answer:";

        assert_eq!(prompt.render(), expected);
    }

    #[test]
    fn should_use_placeholder_without_history() {
        let excerpts = vec!["Only excerpt.".to_string()];
        let prompt = RagPrompt {
            question: "Anything?",
            excerpts: &excerpts,
            history: None,
        };

        let rendered = prompt.render();

        assert!(rendered.contains("Recent conversation:\nNo previous history.\n\n"));
        assert!(rendered.contains("Relevant document excerpts:\nOnly excerpt.\n\n"));
    }
}
