//! Multi-variant retrieval with a deterministic merge.
//!
//! Every query variant is searched concurrently against the same collection.
//! Results are merged by chunk id; each chunk keeps the best rank it reached
//! in any variant's list and its best score. The merged list is ordered by
//! `(best rank asc, score desc, first variant asc, chunk id asc)`, so the
//! output depends only on the search results, never on completion order.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::index::EmbeddingIndex;
use crate::models::{CollectionHandle, ScoredChunk};

/// Default number of chunks returned per variant.
pub const DEFAULT_TOP_K: usize = 4;

/// Runs every query variant and merges the hits.
#[derive(Clone)]
pub struct Retriever {
    index: EmbeddingIndex,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: EmbeddingIndex, top_k: usize) -> Self {
        Self {
            index,
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Search all variants and return the merged, deduplicated context.
    ///
    /// A failed variant is skipped. Fails only if every variant fails, with
    /// the first variant's error.
    pub async fn retrieve(
        &self,
        handle: &CollectionHandle,
        variants: &[String],
    ) -> Result<Vec<ScoredChunk>> {
        let searches = variants
            .iter()
            .map(|variant| self.index.search(handle, variant, self.top_k));
        let results = join_all(searches).await;

        let mut lists = Vec::with_capacity(results.len());
        let mut first_error: Option<RagError> = None;
        let mut failures = 0usize;
        for (variant, result) in variants.iter().zip(results) {
            match result {
                Ok(hits) => lists.push(hits),
                Err(e) => {
                    warn!(variant = %variant, error = %e, "variant search failed");
                    failures += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if failures == variants.len() {
            if let Some(err) = first_error {
                return Err(err);
            }
        }

        let merged = merge_ranked(lists);
        debug!(variants = variants.len(), failures, chunks = merged.len(), "retrieval merged");
        Ok(merged)
    }
}

struct Candidate {
    hit: ScoredChunk,
    best_rank: usize,
    first_variant: usize,
}

/// Merge per-variant ranked lists into one deterministic list.
pub fn merge_ranked(lists: Vec<Vec<ScoredChunk>>) -> Vec<ScoredChunk> {
    let mut by_id: HashMap<String, Candidate> = HashMap::new();

    for (variant, hits) in lists.into_iter().enumerate() {
        for (rank, hit) in hits.into_iter().enumerate() {
            match by_id.get_mut(&hit.chunk.id) {
                Some(c) => {
                    c.best_rank = c.best_rank.min(rank);
                    if hit.score > c.hit.score {
                        c.hit.score = hit.score;
                    }
                }
                None => {
                    by_id.insert(
                        hit.chunk.id.clone(),
                        Candidate {
                            hit,
                            best_rank: rank,
                            first_variant: variant,
                        },
                    );
                }
            }
        }
    }

    let mut candidates: Vec<Candidate> = by_id.into_values().collect();
    candidates.sort_by(|a, b| {
        a.best_rank
            .cmp(&b.best_rank)
            .then_with(|| {
                b.hit
                    .score
                    .partial_cmp(&a.hit.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.first_variant.cmp(&b.first_variant))
            .then_with(|| a.hit.chunk.id.cmp(&b.hit.chunk.id))
    });
    candidates.into_iter().map(|c| c.hit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use crate::index::tests::KeywordEmbedder;
    use crate::models::{Chunk, CollectionInfo};
    use crate::store::memory::InMemoryStore;
    use crate::store::{NewCollection, VectorStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Delegates to an in-memory store, but earlier searches finish later.
    struct DelayedStore {
        inner: Arc<InMemoryStore>,
        searches: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for DelayedStore {
        async fn get_or_create_collection(
            &self,
            spec: NewCollection<'_>,
        ) -> Result<CollectionHandle> {
            self.inner.get_or_create_collection(spec).await
        }
        async fn find_collection(&self, name: &str) -> Result<Option<CollectionHandle>> {
            self.inner.find_collection(name).await
        }
        async fn count(&self, handle: &CollectionHandle) -> Result<usize> {
            self.inner.count(handle).await
        }
        async fn insert(
            &self,
            handle: &CollectionHandle,
            chunks: &[Chunk],
            vectors: &[Vec<f32>],
        ) -> Result<()> {
            self.inner.insert(handle, chunks, vectors).await
        }
        async fn search(
            &self,
            handle: &CollectionHandle,
            query_vec: &[f32],
            k: usize,
        ) -> Result<Vec<ScoredChunk>> {
            let n = self.searches.fetch_add(1, Ordering::SeqCst) as u64;
            tokio::time::sleep(Duration::from_millis(30u64.saturating_sub(10 * n))).await;
            self.inner.search(handle, query_vec, k).await
        }
        async fn delete_collection(&self, handle: &CollectionHandle) -> Result<()> {
            self.inner.delete_collection(handle).await
        }
        async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
            self.inner.list_collections().await
        }
    }

    fn hit(doc: &str, text: &str, score: f32) -> ScoredChunk {
        let chunk: Chunk = chunk_text(doc, text, 100, 0).remove(0);
        ScoredChunk { chunk, score }
    }

    #[test]
    fn test_merge_dedupes_keeping_best_rank_and_score() {
        let a = hit("a.pdf", "alpha", 0.9);
        let b = hit("b.pdf", "beta", 0.8);
        let mut b_better = b.clone();
        b_better.score = 0.95;

        let merged = merge_ranked(vec![vec![a.clone(), b.clone()], vec![b_better]]);
        assert_eq!(merged.len(), 2);
        // beta reached rank 0 in the second list and has the higher score.
        assert_eq!(merged[0].chunk.text, "beta");
        assert!((merged[0].score - 0.95).abs() < 1e-6);
        assert_eq!(merged[1].chunk.text, "alpha");
    }

    #[test]
    fn test_merge_ties_break_on_variant_order() {
        let a = hit("a.pdf", "alpha", 0.5);
        let b = hit("b.pdf", "beta", 0.5);
        let one = merge_ranked(vec![vec![a.clone()], vec![b.clone()]]);
        let two = merge_ranked(vec![vec![a], vec![b]]);
        let ids = |v: &[ScoredChunk]| v.iter().map(|h| h.chunk.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&one), ids(&two));
        // Same rank and score: the earlier variant wins.
        assert_eq!(one[0].chunk.text, "alpha");
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_ranked(vec![vec![], vec![]]).is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_is_deterministic() {
        let embedder = Arc::new(KeywordEmbedder::new(&["paris", "tokyo", "rome"]));
        let index = EmbeddingIndex::new(embedder, Arc::new(InMemoryStore::new()));
        let handle = index
            .get_or_create_collection(&[crate::fingerprint::DocumentKey::new("a.pdf", 1)])
            .await
            .unwrap();
        let mut chunks = chunk_text("a.pdf", "Paris is in France.", 100, 0);
        chunks.extend(chunk_text("b.pdf", "Tokyo is in Japan.", 100, 0));
        chunks.extend(chunk_text("c.pdf", "Rome is in Italy.", 100, 0));
        index.index(&handle, &chunks).await.unwrap();

        let retriever = Retriever::new(index, 1);
        let variants = vec!["paris".to_string(), "tokyo".to_string()];
        let first = retriever.retrieve(&handle, &variants).await.unwrap();
        let second = retriever.retrieve(&handle, &variants).await.unwrap();
        let texts = |v: &[ScoredChunk]| v.iter().map(|h| h.chunk.text.clone()).collect::<Vec<_>>();
        assert_eq!(texts(&first), texts(&second));
        assert_eq!(first[0].chunk.text, "Paris is in France.");
        assert_eq!(first[1].chunk.text, "Tokyo is in Japan.");
    }

    #[tokio::test]
    async fn test_all_variants_failing_returns_error() {
        let index = EmbeddingIndex::new(
            Arc::new(KeywordEmbedder::failing()),
            Arc::new(InMemoryStore::new()),
        );
        let handle = index
            .get_or_create_collection(&[crate::fingerprint::DocumentKey::new("a.pdf", 1)])
            .await
            .unwrap();
        let err = Retriever::new(index, 4)
            .retrieve(&handle, &["q".to_string(), "r".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_merge_ignores_completion_order() {
        let embedder = Arc::new(KeywordEmbedder::new(&["paris", "tokyo", "rome"]));
        let store = Arc::new(InMemoryStore::new());
        let index = EmbeddingIndex::new(embedder.clone(), store.clone());
        let handle = index
            .get_or_create_collection(&[crate::fingerprint::DocumentKey::new("a.pdf", 1)])
            .await
            .unwrap();
        let mut chunks = chunk_text("a.pdf", "Paris is in France.", 100, 0);
        chunks.extend(chunk_text("b.pdf", "Tokyo is in Japan.", 100, 0));
        chunks.extend(chunk_text("c.pdf", "Rome is in Italy.", 100, 0));
        index.index(&handle, &chunks).await.unwrap();

        let variants = vec!["paris".to_string(), "tokyo".to_string(), "rome".to_string()];
        let instant = Retriever::new(index, 1)
            .retrieve(&handle, &variants)
            .await
            .unwrap();

        let delayed = DelayedStore {
            inner: store,
            searches: AtomicUsize::new(0),
        };
        let slow_index = EmbeddingIndex::new(embedder, Arc::new(delayed));
        let reordered = Retriever::new(slow_index, 1)
            .retrieve(&handle, &variants)
            .await
            .unwrap();

        let ids = |v: &[ScoredChunk]| v.iter().map(|h| h.chunk.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&instant), ids(&reordered));
        let texts: Vec<_> = reordered.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(
            texts,
            ["Paris is in France.", "Tokyo is in Japan.", "Rome is in Italy."]
        );
    }
}
