use anyhow::{Context, Result};
use docchat_core::history::{format_turns, ChatTurn};
use docchat_core::Config;
use embeddings::{ChunkConfig, EmbeddingProvider, TextChunker};
use ingest::ParserRegistry;
use llm::{GeminiClient, ModelConfig, RagPrompt};
use std::path::PathBuf;
use store::Document;
use tracing::{error, info, warn};
use uuid::Uuid;
use vector_store::{AnyVectorStore, ChunkMetadata, DocumentChunk, SearchFilter};

pub const NO_RELEVANT_CHUNKS: &str =
    "I couldn't find any relevant information in the selected documents.";
pub const API_KEY_MISSING: &str =
    "Error: Google API key is not configured. Please set GOOGLE_API_KEY in your .env file.";
pub const EMPTY_ANSWER: &str = "I couldn't generate a response. Please try again.";

/// Turns of history replayed into the prompt.
const HISTORY_PROMPT_TURNS: usize = 10;

pub fn answer_failure(e: &anyhow::Error) -> String {
    format!("An error occurred while processing your question: {}", e)
}

/// Outcome of retrieval: either a final answer that needs no model call, or
/// the prompt to send to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedAnswer {
    Ready(String),
    Prompt(String),
}

/// Document indexing and retrieval-augmented answering.
pub struct RagService {
    embedder: Box<dyn EmbeddingProvider>,
    vectors: AnyVectorStore,
    llm: GeminiClient,
    chunker: TextChunker,
    parsers: ParserRegistry,
    media_root: PathBuf,
    top_k: usize,
    api_key_configured: bool,
}

impl std::fmt::Debug for RagService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagService")
            .field("embedder", &"EmbeddingProvider<...>")
            .field("vectors", &"AnyVectorStore<...>")
            .field("llm", &self.llm.config().primary_model)
            .field("media_root", &self.media_root)
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl RagService {
    pub fn new(
        config: &Config,
        embedder: Box<dyn EmbeddingProvider>,
        vectors: AnyVectorStore,
    ) -> Result<Self> {
        let llm = GeminiClient::new(ModelConfig::from(&config.llm))
            .context("Failed to create Gemini client")?;
        let parsers = ParserRegistry::with_defaults()?;
        let chunker = TextChunker::new(ChunkConfig {
            chunk_size: config.rag.chunk_size,
            overlap_size: config.rag.chunk_overlap,
        });

        info!(
            "RAG service ready: {} dim embeddings, model {} (fallback {})",
            embedder.dimension(),
            config.llm.primary,
            config.llm.fallback
        );

        Ok(Self {
            embedder,
            vectors,
            llm,
            chunker,
            parsers,
            media_root: PathBuf::from(&config.uploads.media_dir),
            top_k: config.rag.top_k,
            api_key_configured: config.llm.has_api_key(),
        })
    }

    pub fn llm(&self) -> &GeminiClient {
        &self.llm
    }

    /// Parses, chunks, embeds and stores a document. Failures are logged and
    /// reported as `false`.
    pub async fn index_document(&self, document: &Document, user_id: Uuid) -> bool {
        match self.try_index_document(document, user_id).await {
            Ok(indexed) => indexed,
            Err(e) => {
                error!("Error indexing document {}: {:#}", document.id, e);
                false
            }
        }
    }

    async fn try_index_document(&self, document: &Document, user_id: Uuid) -> Result<bool> {
        let path = self.media_root.join(&document.file_path);
        let text = self
            .parsers
            .parse_file(&path, &document.file_extension())
            .await?;

        if text.trim().is_empty() {
            warn!("No text extracted from {}", document.name);
            return Ok(false);
        }

        let chunks = self.chunker.chunk_text(&text);
        let contents: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let embeddings = self
            .embedder
            .embed(contents.clone())
            .await
            .context("Failed to embed document chunks")?;

        let records: Vec<DocumentChunk> = contents
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (content, embedding))| {
                DocumentChunk::new(
                    ChunkMetadata {
                        user_id,
                        document_id: document.id,
                        document_name: document.name.clone(),
                        chunk_index,
                    },
                    content,
                    embedding,
                )
            })
            .collect();

        let stored = self.vectors.insert_chunks(records).await?;
        info!("Indexed {} chunks from {}", stored.len(), document.name);
        Ok(true)
    }

    /// Removes the document's chunks from the index; failures are only logged.
    pub async fn delete_document_embeddings(&self, document_id: Uuid, user_id: Uuid) {
        match self.vectors.delete_document(document_id, user_id).await {
            Ok(0) => {}
            Ok(deleted) => info!(
                "Deleted {} embeddings for document {}",
                deleted, document_id
            ),
            Err(e) => error!(
                "Error deleting embeddings for document {}: {:#}",
                document_id, e
            ),
        }
    }

    /// Retrieves context for the question and builds the model prompt.
    pub async fn prepare_answer(
        &self,
        question: &str,
        user_id: Uuid,
        document_ids: &[Uuid],
        history: &[ChatTurn],
    ) -> Result<PreparedAnswer> {
        let query_embedding = self
            .embedder
            .embed(vec![question.to_string()])
            .await?
            .into_iter()
            .next()
            .context("Embedding provider returned no query embedding")?;

        let filter = SearchFilter::new(user_id, document_ids.to_vec());
        let results = self
            .vectors
            .search_similar(query_embedding, &filter, self.top_k)
            .await?;

        if results.is_empty() {
            return Ok(PreparedAnswer::Ready(NO_RELEVANT_CHUNKS.to_string()));
        }

        let excerpts: Vec<String> = results
            .into_iter()
            .map(|result| result.record.content)
            .collect();
        let history_text = format_turns(history, HISTORY_PROMPT_TURNS);
        let prompt = RagPrompt {
            question,
            excerpts: &excerpts,
            history: history_text.as_deref(),
        }
        .render();

        if !self.api_key_configured {
            return Ok(PreparedAnswer::Ready(API_KEY_MISSING.to_string()));
        }

        Ok(PreparedAnswer::Prompt(prompt))
    }

    /// Answers a question from the selected documents. Never fails: errors
    /// become the answer text.
    pub async fn answer_question(
        &self,
        question: &str,
        user_id: Uuid,
        document_ids: &[Uuid],
        history: &[ChatTurn],
    ) -> String {
        let result = async {
            match self
                .prepare_answer(question, user_id, document_ids, history)
                .await?
            {
                PreparedAnswer::Ready(text) => Ok(text),
                PreparedAnswer::Prompt(prompt) => self.llm.generate(&prompt).await,
            }
        }
        .await;

        match result {
            Ok(text) if text.trim().is_empty() => EMPTY_ANSWER.to_string(),
            Ok(text) => text,
            Err(e) => {
                error!("Error answering question: {:#}", e);
                answer_failure(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_core::Role;
    use embeddings::create_embedding_provider;
    use vector_store::InMemoryVectorStore;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(media_root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.uploads.media_dir = media_root.to_string_lossy().to_string();
        config.llm.max_retries = 0;
        config
    }

    async fn write_document(media_root: &std::path::Path, name: &str, text: &str) -> Document {
        let relative = format!("documents/{}", name);
        let full = media_root.join(&relative);
        tokio::fs::create_dir_all(full.parent().unwrap()).await.unwrap();
        tokio::fs::write(&full, text).await.unwrap();
        Document::new(Uuid::new_v4(), name, relative)
    }

    fn service(config: &Config) -> RagService {
        let embedder = create_embedding_provider(&config.embedding, &config.llm.api_key).unwrap();
        RagService::new(
            config,
            embedder,
            AnyVectorStore::InMemory(InMemoryVectorStore::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn should_index_text_document() {
        let media = tempfile::tempdir().unwrap();
        let rag = service(&test_config(media.path()));
        let document = write_document(
            media.path(),
            "policy.txt",
            "Employees get 25 vacation days. Requests go through the HR portal.",
        )
        .await;

        assert!(rag.index_document(&document, document.user_id).await);
        assert_eq!(rag.vectors.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn should_not_index_blank_document() {
        let media = tempfile::tempdir().unwrap();
        let rag = service(&test_config(media.path()));
        let document = write_document(media.path(), "blank.txt", "   \n\n  ").await;

        assert!(!rag.index_document(&document, document.user_id).await);
        assert_eq!(rag.vectors.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_report_failure_for_missing_file() {
        let media = tempfile::tempdir().unwrap();
        let rag = service(&test_config(media.path()));
        let document = Document::new(Uuid::new_v4(), "gone.txt", "documents/gone.txt");

        assert!(!rag.index_document(&document, document.user_id).await);
    }

    #[tokio::test]
    async fn should_delete_document_embeddings() {
        let media = tempfile::tempdir().unwrap();
        let rag = service(&test_config(media.path()));
        let document = write_document(media.path(), "a.txt", "Some content here.").await;
        rag.index_document(&document, document.user_id).await;

        rag.delete_document_embeddings(document.id, document.user_id)
            .await;
        rag.delete_document_embeddings(document.id, document.user_id)
            .await;

        assert_eq!(rag.vectors.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_answer_without_matches() {
        let media = tempfile::tempdir().unwrap();
        let rag = service(&test_config(media.path()));

        let answer = rag
            .answer_question("Anything?", Uuid::new_v4(), &[Uuid::new_v4()], &[])
            .await;

        assert_eq!(answer, NO_RELEVANT_CHUNKS);
    }

    #[tokio::test]
    async fn should_require_api_key_before_calling_model() {
        let media = tempfile::tempdir().unwrap();
        let rag = service(&test_config(media.path()));
        let document = write_document(media.path(), "a.txt", "The office opens at nine.").await;
        rag.index_document(&document, document.user_id).await;

        let answer = rag
            .answer_question(
                "When does the office open?",
                document.user_id,
                &[document.id],
                &[],
            )
            .await;

        assert_eq!(answer, API_KEY_MISSING);
    }

    #[tokio::test]
    async fn should_not_search_other_users_documents() {
        let media = tempfile::tempdir().unwrap();
        let rag = service(&test_config(media.path()));
        let document = write_document(media.path(), "a.txt", "Private notes.").await;
        rag.index_document(&document, document.user_id).await;

        let answer = rag
            .answer_question("notes", Uuid::new_v4(), &[document.id], &[])
            .await;

        assert_eq!(answer, NO_RELEVANT_CHUNKS);
    }

    #[tokio::test]
    async fn should_send_history_and_excerpts_to_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"/models/.*:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "Nine o'clock."}], "role": "model"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let media = tempfile::tempdir().unwrap();
        let mut config = test_config(media.path());
        config.llm.api_key = "test-key".to_string();
        config.llm.base_url = server.uri();
        let rag = service(&config);
        let document = write_document(media.path(), "a.txt", "The office opens at nine.").await;
        rag.index_document(&document, document.user_id).await;
        let history = vec![ChatTurn {
            role: Role::User,
            content: "Hi".to_string(),
        }];

        let prepared = rag
            .prepare_answer("When?", document.user_id, &[document.id], &history)
            .await
            .unwrap();
        let PreparedAnswer::Prompt(prompt) = prepared else {
            panic!("expected a prompt");
        };
        assert!(prompt.contains("Recent conversation:\nUser: Hi"));
        assert!(prompt.contains("The office opens at nine."));

        let answer = rag
            .answer_question("When?", document.user_id, &[document.id], &history)
            .await;
        assert_eq!(answer, "Nine o'clock.");
    }

    #[tokio::test]
    async fn should_turn_model_errors_into_answer_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let media = tempfile::tempdir().unwrap();
        let mut config = test_config(media.path());
        config.llm.api_key = "test-key".to_string();
        config.llm.base_url = server.uri();
        let rag = service(&config);
        let document = write_document(media.path(), "a.txt", "Content.").await;
        rag.index_document(&document, document.user_id).await;

        let answer = rag
            .answer_question("What?", document.user_id, &[document.id], &[])
            .await;

        assert!(answer.starts_with("An error occurred while processing your question:"));
    }

    #[tokio::test]
    async fn should_replace_empty_model_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": []
            })))
            .mount(&server)
            .await;

        let media = tempfile::tempdir().unwrap();
        let mut config = test_config(media.path());
        config.llm.api_key = "test-key".to_string();
        config.llm.base_url = server.uri();
        let rag = service(&config);
        let document = write_document(media.path(), "a.txt", "Content.").await;
        rag.index_document(&document, document.user_id).await;

        let answer = rag
            .answer_question("What?", document.user_id, &[document.id], &[])
            .await;

        assert_eq!(answer, EMPTY_ANSWER);
    }
}
