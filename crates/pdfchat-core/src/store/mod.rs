//! Vector store abstraction.
//!
//! The [`VectorStore`] trait covers every storage operation the pipeline
//! needs: named collections of (chunk, vector) pairs with k-nearest-neighbour
//! search and deletion. Backends must be `Send + Sync` and must tolerate
//! concurrent use of distinct collections from several sessions.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`get_or_create_collection`](VectorStore::get_or_create_collection) | Resolve a collection by name, creating it on first use |
//! | [`find_collection`](VectorStore::find_collection) | Look up an existing collection |
//! | [`count`](VectorStore::count) | Number of stored chunks |
//! | [`insert`](VectorStore::insert) | Append chunks and vectors, all-or-nothing |
//! | [`search`](VectorStore::search) | Top-k chunks by cosine similarity |
//! | [`delete_collection`](VectorStore::delete_collection) | Remove a collection and its vectors |
//! | [`list_collections`](VectorStore::list_collections) | Summaries of all collections |

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chunk, CollectionHandle, CollectionInfo, ScoredChunk};

/// Parameters for creating a collection.
#[derive(Debug, Clone)]
pub struct NewCollection<'a> {
    pub name: &'a str,
    pub fingerprint: &'a str,
    pub model: &'a str,
    pub dims: usize,
}

/// Abstract storage backend for indexed chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return the collection named `spec.name`, creating it if absent.
    ///
    /// An existing collection is returned as-is, even if its model differs;
    /// callers compare [`CollectionHandle::model`] themselves.
    async fn get_or_create_collection(&self, spec: NewCollection<'_>) -> Result<CollectionHandle>;

    /// Look up a collection by name.
    async fn find_collection(&self, name: &str) -> Result<Option<CollectionHandle>>;

    /// Number of chunks stored in the collection.
    async fn count(&self, handle: &CollectionHandle) -> Result<usize>;

    /// Store chunks with their vectors. Either every pair is written or none.
    ///
    /// Chunks whose id already exists in the collection are skipped.
    async fn insert(
        &self,
        handle: &CollectionHandle,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()>;

    /// Top-`k` chunks by cosine similarity to `query_vec`, best first.
    ///
    /// Fails with [`RagError::CollectionNotFound`](crate::error::RagError::CollectionNotFound)
    /// if the collection was deleted.
    async fn search(
        &self,
        handle: &CollectionHandle,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Delete the collection and every vector in it. Irreversible.
    async fn delete_collection(&self, handle: &CollectionHandle) -> Result<()>;

    /// Summaries of all collections, ordered by name.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;
}

/// Shared validation for [`VectorStore::insert`] implementations.
pub fn check_insert(handle: &CollectionHandle, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
    use crate::error::RagError;

    if chunks.len() != vectors.len() {
        return Err(RagError::Store(format!(
            "{} chunks but {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }
    if let Some(v) = vectors.iter().find(|v| v.len() != handle.dims) {
        return Err(RagError::Store(format!(
            "vector has {} dimensions, collection {} expects {}",
            v.len(),
            handle.name,
            handle.dims
        )));
    }
    Ok(())
}

/// Order search hits: similarity desc, then document and chunk position.
pub fn sort_hits(hits: &mut [ScoredChunk]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.document.cmp(&b.chunk.document))
            .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
}
