use crate::rag::RagService;
use anyhow::{Context, Result};
use docchat_core::history::HistoryWindow;
use docchat_core::{AlertCenter, Config};
use embeddings::{create_embedding_provider, EmbeddingProvider};
use ingest::UploadPolicy;
use std::path::PathBuf;
use std::sync::Arc;
use store::{
    AnyRecordStore, AnySessionStore, MemoryRecordStore, MemorySessionStore, PgRecordStore,
    RedisSessionStore,
};
use tracing::info;
use vector_store::{AnyVectorStore, InMemoryVectorStore, PgVectorStore};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub records: Arc<AnyRecordStore>,
    pub sessions: Arc<AnySessionStore>,
    pub alerts: Arc<AlertCenter>,
    pub rag: Arc<RagService>,
    pub uploads: UploadPolicy,
    pub history: HistoryWindow,
    pub password_cost: u32,
}

impl AppState {
    /// Connects the configured backends. `memory://` URLs select the
    /// in-process stores.
    pub async fn from_config(config: Config) -> Result<Self> {
        let embedder = embedder_for(&config)?;

        let (records, vectors) = if config.database.is_memory() {
            info!("Using in-memory record and vector stores");
            (
                AnyRecordStore::Memory(MemoryRecordStore::new()),
                AnyVectorStore::InMemory(InMemoryVectorStore::new()),
            )
        } else {
            db_migrations::run_migrations(&config.database.url)
                .await
                .context("Failed to run database migrations")?;
            let pg = PgRecordStore::connect(&config.database.url, config.database.max_connections)
                .await?;
            let vectors = PgVectorStore::new(pg.pool().clone(), embedder.dimension());
            (AnyRecordStore::Postgres(pg), AnyVectorStore::Postgres(vectors))
        };

        let sessions = if config.redis.is_memory() {
            info!("Using in-memory session store");
            AnySessionStore::Memory(MemorySessionStore::new(config.redis.session_ttl()))
        } else {
            AnySessionStore::Redis(
                RedisSessionStore::connect(&config.redis.url, config.redis.session_ttl()).await?,
            )
        };

        Self::assemble(config, records, sessions, embedder, vectors)
    }

    fn assemble(
        config: Config,
        records: AnyRecordStore,
        sessions: AnySessionStore,
        embedder: Box<dyn EmbeddingProvider>,
        vectors: AnyVectorStore,
    ) -> Result<Self> {
        let rag = RagService::new(&config, embedder, vectors)?;
        let alerts = AlertCenter::new(config.alerts.timings());

        Ok(Self {
            uploads: UploadPolicy::from(&config.uploads),
            history: HistoryWindow::new(config.rag.history_hours, config.rag.history_max_messages),
            password_cost: bcrypt::DEFAULT_COST,
            records: Arc::new(records),
            sessions: Arc::new(sessions),
            alerts: Arc::new(alerts),
            rag: Arc::new(rag),
            config: Arc::new(config),
        })
    }

    /// Lower bcrypt cost, for tests.
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    pub fn media_root(&self) -> PathBuf {
        PathBuf::from(&self.config.uploads.media_dir)
    }
}

fn embedder_for(config: &Config) -> Result<Box<dyn EmbeddingProvider>> {
    create_embedding_provider(&config.embedding, &config.llm.api_key)
        .context("Failed to create embedding provider")
}
