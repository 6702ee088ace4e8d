//! RAG session orchestrator.
//!
//! A [`RagSession`] owns one conversation over one document set. It moves
//! through three states:
//!
//! ```text
//! Uninitialized ──build_index──▶ Ready ──clear──▶ Cleared
//!       ▲                          │                 │
//!       └──── build_index fails ◀──┘                 │
//!                                  ◀──build_index────┘
//! ```
//!
//! `Cleared` behaves exactly like `Uninitialized`; it only records that the
//! user deleted the knowledge base.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut session = RagSession::builder()
//!     .embedder(embedder)
//!     .generator(generator)
//!     .store(Arc::new(InMemoryStore::new()))
//!     .build()?;
//!
//! session.build_index(&documents).await?;
//! let answer = session.ask("What is the capital of France?").await?;
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::expand::{QueryExpander, DEFAULT_QUERY_VARIANTS};
use crate::generation::Generator;
use crate::index::{EmbeddingIndex, DEFAULT_BATCH_SIZE};
use crate::ingest::{Ingestor, PageExtractor};
use crate::models::{CollectionHandle, Document, Message};
use crate::retrieve::{Retriever, DEFAULT_TOP_K};
use crate::store::VectorStore;
use crate::synthesize::AnswerSynthesizer;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1500;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Lifecycle state of a [`RagSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Uninitialized,
    Ready,
    Cleared,
}

/// Tunable parameters of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub query_variants: usize,
    pub top_k: usize,
    pub batch_size: usize,
    pub max_context_chars: Option<usize>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            query_variants: DEFAULT_QUERY_VARIANTS,
            top_k: DEFAULT_TOP_K,
            batch_size: DEFAULT_BATCH_SIZE,
            max_context_chars: None,
        }
    }
}

impl SessionOptions {
    /// Check parameter consistency.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(RagError::Config("batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Outcome of a successful [`RagSession::build_index`].
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub collection: String,
    pub documents: usize,
    pub chunks: usize,
    /// `true` if an existing collection was reused without embedding.
    pub reused: bool,
}

/// One conversation over one indexed document set.
pub struct RagSession {
    ingestor: Ingestor,
    index: EmbeddingIndex,
    expander: QueryExpander,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    state: SessionState,
    collection: Option<CollectionHandle>,
    messages: Vec<Message>,
}

impl RagSession {
    pub fn builder() -> RagSessionBuilder {
        RagSessionBuilder::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// The collection backing the session while `Ready`.
    pub fn collection(&self) -> Option<&CollectionHandle> {
        self.collection.as_ref()
    }

    /// The conversation so far, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Ingest `documents` and make their collection searchable.
    ///
    /// If a collection for the same `(name, size)` set already holds chunks
    /// from the same embedding model, it is reused and nothing is embedded.
    /// A collection built with a different model is dropped and rebuilt.
    ///
    /// On failure the session is left `Uninitialized`.
    pub async fn build_index(&mut self, documents: &[Document]) -> Result<IndexSummary> {
        match self.try_build_index(documents).await {
            Ok((handle, summary)) => {
                info!(
                    collection = %summary.collection,
                    documents = summary.documents,
                    chunks = summary.chunks,
                    reused = summary.reused,
                    "index ready"
                );
                self.collection = Some(handle);
                self.state = SessionState::Ready;
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, "build_index failed");
                self.collection = None;
                self.state = SessionState::Uninitialized;
                Err(e)
            }
        }
    }

    async fn try_build_index(
        &self,
        documents: &[Document],
    ) -> Result<(CollectionHandle, IndexSummary)> {
        let chunks = self.ingestor.ingest(documents).await?;
        let keys: Vec<_> = documents.iter().map(Document::key).collect();

        let mut handle = self.index.get_or_create_collection(&keys).await?;
        if handle.model != self.index.model_name() {
            warn!(
                collection = %handle.name,
                stored_model = %handle.model,
                model = %self.index.model_name(),
                "embedding model changed, rebuilding collection"
            );
            self.index.delete_collection(&handle).await?;
            handle = self.index.get_or_create_collection(&keys).await?;
        }

        let existing = self.index.count(&handle).await?;
        let reused = existing > 0;
        if !reused {
            self.index.index(&handle, &chunks).await?;
        }

        let summary = IndexSummary {
            collection: handle.name.clone(),
            documents: documents.len(),
            chunks: if reused { existing } else { chunks.len() },
            reused,
        };
        Ok((handle, summary))
    }

    /// Answer a question from the indexed documents.
    ///
    /// The question and then the answer are appended to the conversation. If
    /// answering fails, the failure's user message is appended in place of the
    /// answer and the error returned; the session stays `Ready`.
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        let handle = match (&self.state, &self.collection) {
            (SessionState::Ready, Some(handle)) => handle.clone(),
            _ => return Err(RagError::IndexNotReady),
        };
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        self.messages.push(Message::user(question));
        match self.answer(&handle, question).await {
            Ok(answer) => {
                self.messages.push(Message::assistant(answer.clone()));
                Ok(answer)
            }
            Err(e) => {
                error!(collection = %handle.name, error = %e, "ask failed");
                self.messages.push(Message::assistant(e.user_message()));
                Err(e)
            }
        }
    }

    async fn answer(&self, handle: &CollectionHandle, question: &str) -> Result<String> {
        let variants = self.expander.expand(question).await;
        let context = self.retriever.retrieve(handle, &variants).await?;
        info!(
            collection = %handle.name,
            variants = variants.len(),
            chunks = context.len(),
            "context retrieved"
        );
        self.synthesizer.synthesize(question, &context).await
    }

    /// Delete the collection and forget the conversation.
    pub async fn clear(&mut self) -> Result<()> {
        let handle = match (&self.state, &self.collection) {
            (SessionState::Ready, Some(handle)) => handle.clone(),
            _ => return Err(RagError::IndexNotReady),
        };
        self.index.delete_collection(&handle).await?;
        self.collection = None;
        self.messages.clear();
        self.state = SessionState::Cleared;
        Ok(())
    }
}

/// Builder for [`RagSession`].
///
/// `embedder`, `generator`, and `store` are required.
#[derive(Default)]
pub struct RagSessionBuilder {
    embedder: Option<Arc<dyn Embedder>>,
    generator: Option<Arc<dyn Generator>>,
    store: Option<Arc<dyn VectorStore>>,
    options: SessionOptions,
    extractors: Vec<Box<dyn PageExtractor>>,
}

impl RagSessionBuilder {
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Register an extra page extractor (e.g. PDF).
    pub fn extractor(mut self, extractor: impl PageExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// Build the session.
    ///
    /// Fails with [`RagError::Config`] if a required part is missing or the
    /// options are inconsistent, and with [`RagError::Template`] if a built-in
    /// prompt template is malformed.
    pub fn build(self) -> Result<RagSession> {
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::Config("embedder is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::Config("generator is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| RagError::Config("store is required".to_string()))?;
        let options = self.options;
        options.validate()?;

        let mut ingestor = Ingestor::new(options.chunk_size, options.chunk_overlap);
        for extractor in self.extractors {
            ingestor = ingestor.with_boxed_extractor(extractor);
        }
        let index = EmbeddingIndex::new(embedder, store).with_batch_size(options.batch_size);

        Ok(RagSession {
            ingestor,
            expander: QueryExpander::new(generator.clone(), options.query_variants)?,
            retriever: Retriever::new(index.clone(), options.top_k),
            synthesizer: AnswerSynthesizer::new(generator)?
                .with_max_context_chars(options.max_context_chars),
            index,
            state: SessionState::Uninitialized,
            collection: None,
            messages: Vec::new(),
        })
    }
}
