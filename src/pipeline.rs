//! Wiring configuration into ready-to-use sessions.
//!
//! A [`Pipeline`] owns the shared pieces (SQLite store, embedder, generator)
//! and hands out independent [`RagSession`]s over them. The CLI creates one
//! session per command; the HTTP server creates one per client session.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use pdfchat_core::embedding::Embedder;
use pdfchat_core::generation::Generator;
use pdfchat_core::store::VectorStore;
use pdfchat_core::RagSession;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::extract::PdfExtractor;
use crate::generation::create_generator;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Shared backends for every session.
#[derive(Clone)]
pub struct Pipeline {
    config: Config,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

impl Pipeline {
    /// Open the database (migrating it if needed) and create providers.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool)
            .await
            .context("Failed to apply database migrations")?;
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Ok(Self::with_backends(
            config.clone(),
            Arc::new(SqliteStore::new(pool)),
            embedder,
            generator,
        ))
    }

    /// Assemble a pipeline from explicit backends.
    pub fn with_backends(
        config: Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            generator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// A fresh, `Uninitialized` session.
    pub fn new_session(&self) -> Result<RagSession> {
        let session = RagSession::builder()
            .embedder(self.embedder.clone())
            .generator(self.generator.clone())
            .store(self.store.clone())
            .options(self.config.session_options())
            .extractor(PdfExtractor::new(Duration::from_secs(
                self.config.extraction.timeout_secs,
            )))
            .build()?;
        Ok(session)
    }
}
