//! Embedding index: chunks in, searchable collection out.
//!
//! [`EmbeddingIndex`] couples an [`Embedder`] with a [`VectorStore`]. It owns
//! collection naming (via [`fingerprint`](crate::fingerprint)), batched
//! embedding, and query-time embedding for search.
//!
//! Indexing is all-or-nothing: every batch is embedded before anything is
//! written, and the write itself is a single store transaction.

use std::sync::Arc;

use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::fingerprint::{collection_name, fingerprint, DocumentKey};
use crate::models::{Chunk, CollectionHandle, ScoredChunk};
use crate::store::{NewCollection, VectorStore};

/// Default number of chunks sent to the embedder per request.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Embeds chunks and queries against one embedding model.
#[derive(Clone)]
pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl EmbeddingIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the embedding batch size. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Resolve the collection for a document set, creating it on first use.
    ///
    /// The same multiset of `(name, size)` keys always maps to the same
    /// collection name, regardless of order.
    pub async fn get_or_create_collection(&self, keys: &[DocumentKey]) -> Result<CollectionHandle> {
        let fp = fingerprint(keys);
        let name = collection_name(&fp);
        self.store
            .get_or_create_collection(NewCollection {
                name: &name,
                fingerprint: &fp,
                model: self.embedder.model_name(),
                dims: self.embedder.dims(),
            })
            .await
    }

    /// Look up the collection for a document set without creating it.
    pub async fn find_collection(&self, keys: &[DocumentKey]) -> Result<Option<CollectionHandle>> {
        let name = collection_name(&fingerprint(keys));
        self.store.find_collection(&name).await
    }

    /// Number of chunks stored in the collection.
    pub async fn count(&self, handle: &CollectionHandle) -> Result<usize> {
        self.store.count(handle).await
    }

    /// Embed and store chunks. Nothing is written if any batch fails.
    pub async fn index(&self, handle: &CollectionHandle, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let batch_vectors = self.embed(&texts).await?;
            debug!(collection = %handle.name, batch = batch.len(), "embedded batch");
            vectors.extend(batch_vectors);
        }

        self.store.insert(handle, chunks, &vectors).await?;
        info!(
            collection = %handle.name,
            chunks = chunks.len(),
            model = %handle.model,
            "collection indexed"
        );
        Ok(())
    }

    /// Embed `query` and return the `k` most similar chunks, best first.
    pub async fn search(
        &self,
        handle: &CollectionHandle,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let mut vectors = self.embed(&[query.to_string()]).await?;
        let query_vec = vectors
            .pop()
            .ok_or_else(|| RagError::EmbeddingUnavailable("empty embedding response".into()))?;
        self.store.search(handle, &query_vec, k).await
    }

    /// Delete the collection and all of its vectors.
    pub async fn delete_collection(&self, handle: &CollectionHandle) -> Result<()> {
        self.store.delete_collection(handle).await?;
        info!(collection = %handle.name, "collection deleted");
        Ok(())
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self
            .embedder
            .embed(texts)
            .await
            .map_err(|e| RagError::EmbeddingUnavailable(format!("{:#}", e)))?;
        if vectors.len() != texts.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Keyword-count embedder: one dimension per vocabulary word.
    pub(crate) struct KeywordEmbedder {
        pub vocab: Vec<&'static str>,
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl KeywordEmbedder {
        pub fn new(vocab: &[&'static str]) -> Self {
            Self {
                vocab: vocab.to_vec(),
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(&["x"])
            }
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword-test"
        }

        fn dims(&self) -> usize {
            self.vocab.len()
        }

        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    self.vocab
                        .iter()
                        .map(|w| lower.matches(w).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    fn keys() -> Vec<DocumentKey> {
        vec![DocumentKey::new("a.pdf", 10), DocumentKey::new("b.pdf", 20)]
    }

    #[tokio::test]
    async fn test_collection_name_is_order_insensitive() {
        let index = EmbeddingIndex::new(
            Arc::new(KeywordEmbedder::new(&["x"])),
            Arc::new(InMemoryStore::new()),
        );
        let mut reversed = keys();
        reversed.reverse();
        let a = index.get_or_create_collection(&keys()).await.unwrap();
        let b = index.get_or_create_collection(&reversed).await.unwrap();
        assert_eq!(a.name, b.name);
        assert!(a.name.starts_with("pdfs_"));
    }

    #[tokio::test]
    async fn test_index_batches_and_search() {
        let embedder = Arc::new(KeywordEmbedder::new(&["paris", "tokyo"]));
        let index = EmbeddingIndex::new(embedder.clone(), Arc::new(InMemoryStore::new()))
            .with_batch_size(1);
        let handle = index.get_or_create_collection(&keys()).await.unwrap();

        let mut chunks = chunk_text("a.pdf", "Paris is in France.", 100, 0);
        chunks.extend(chunk_text("b.pdf", "Tokyo is in Japan.", 100, 0));
        index.index(&handle, &chunks).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(index.count(&handle).await.unwrap(), 2);

        let hits = index.search(&handle, "tell me about tokyo", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.document, "b.pdf");
    }

    #[tokio::test]
    async fn test_embedding_failure_writes_nothing() {
        let index = EmbeddingIndex::new(
            Arc::new(KeywordEmbedder::failing()),
            Arc::new(InMemoryStore::new()),
        );
        let handle = index.get_or_create_collection(&keys()).await.unwrap();
        let chunks = chunk_text("a.pdf", "text", 100, 0);

        let err = index.index(&handle, &chunks).await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingUnavailable(_)));
        assert_eq!(index.count(&handle).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_after_delete_fails() {
        let index = EmbeddingIndex::new(
            Arc::new(KeywordEmbedder::new(&["x"])),
            Arc::new(InMemoryStore::new()),
        );
        let handle = index.get_or_create_collection(&keys()).await.unwrap();
        index.delete_collection(&handle).await.unwrap();
        let err = index.search(&handle, "x", 3).await.unwrap_err();
        assert!(matches!(err, RagError::CollectionNotFound(_)));
    }
}
