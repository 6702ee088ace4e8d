//! Core data models.
//!
//! These types flow through the pipeline: uploaded [`Document`]s are split
//! into [`Page`]s and then [`Chunk`]s, chunks are stored in a collection
//! identified by a [`CollectionHandle`], and each question/answer exchange is
//! recorded as [`Message`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::DocumentKey;

/// An uploaded document: name plus raw bytes.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Size of the document in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lower-cased file extension of the document name, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    /// The `(name, size)` pair used for collection fingerprinting.
    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(&self.name, self.size())
    }
}

/// Text of one page of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Name of the source document.
    pub document: String,
    /// 0-based position of the page in the document.
    pub index: usize,
    pub text: String,
}

/// A bounded span of document text; the atomic retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic UUID (v5) derived from document, index, and content hash.
    pub id: String,
    /// Name of the source document.
    pub document: String,
    /// Page on which the chunk starts.
    pub page: usize,
    /// Position of the chunk within its document, starting at 0.
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A chunk returned by similarity search, with its cosine similarity.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Handle to a persisted collection of (chunk, vector) pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionHandle {
    /// Store-assigned identifier (UUID).
    pub id: String,
    /// Deterministic collection name, `pdfs_<fingerprint prefix>`.
    pub name: String,
    /// Full fingerprint of the document set.
    pub fingerprint: String,
    /// Embedding model used for the vectors in this collection.
    pub model: String,
    /// Vector dimensionality.
    pub dims: usize,
}

/// Summary row for listing collections.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub model: String,
    pub dims: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of a session's append-only conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
