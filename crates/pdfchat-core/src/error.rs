//! Error taxonomy for the RAG pipeline.
//!
//! Every failure that can reach a caller of [`RagSession`](crate::session::RagSession)
//! is one of these variants. The `Display` output carries internal detail for
//! logs; [`RagError::user_message`] gives the short sentence a UI should show.

use thiserror::Error;

/// Errors produced by ingestion, indexing, retrieval, and synthesis.
#[derive(Debug, Error)]
pub enum RagError {
    /// `build_index` was called with an empty document set.
    #[error("no documents were provided")]
    NoDocuments,

    /// Ingestion produced zero chunks from a non-empty document set.
    #[error("no extractable text found in {documents} document(s)")]
    NoExtractableContent {
        /// Number of documents that were submitted.
        documents: usize,
    },

    /// The embedding capability could not be reached, errored, or timed out.
    #[error("embedding capability unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The generation capability could not be reached, errored, or timed out.
    #[error("generation capability unavailable: {0}")]
    GenerationUnavailable(String),

    /// An operation that needs a built index was called without one.
    #[error("index is not ready")]
    IndexNotReady,

    /// `ask` was called with a blank question.
    #[error("question must not be empty")]
    EmptyQuestion,

    /// The collection behind a handle does not exist (never created or deleted).
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// The vector store backend failed.
    #[error("vector store error: {0}")]
    Store(String),

    /// A prompt template failed validation or rendering.
    #[error("invalid prompt template: {0}")]
    Template(String),

    /// Session parameters are inconsistent (e.g. overlap not below chunk size).
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RagError {
    /// Short, user-facing description of the failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            RagError::NoDocuments => "Please upload at least one document.",
            RagError::NoExtractableContent { .. } => {
                "No text could be extracted from the uploaded documents. \
                 Scanned PDFs need OCR before they can be queried."
            }
            RagError::EmbeddingUnavailable(_) => {
                "The embedding service is unavailable. Please try processing the documents again."
            }
            RagError::GenerationUnavailable(_) => {
                "The language model is unavailable right now. Please ask again in a moment."
            }
            RagError::IndexNotReady => {
                "The knowledge base is not ready. Upload and process documents first."
            }
            RagError::EmptyQuestion => "Please type a question.",
            RagError::CollectionNotFound(_) => {
                "The knowledge base no longer exists. Process the documents again."
            }
            RagError::Store(_) => "The knowledge base storage failed. Please try again.",
            RagError::Template(_) => "The assistant is misconfigured (invalid prompt template).",
            RagError::Config(_) => "The assistant is misconfigured. Check the configuration file.",
        }
    }

    /// Whether re-invoking the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingUnavailable(_) | RagError::GenerationUnavailable(_) | RagError::Store(_)
        )
    }
}

/// Convenience result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
