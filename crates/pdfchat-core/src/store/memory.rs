//! In-memory [`VectorStore`] for tests and ephemeral sessions.
//!
//! Collections live in a `HashMap` behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity over the collection's vectors.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{Chunk, CollectionHandle, CollectionInfo, ScoredChunk};

use super::{check_insert, sort_hits, NewCollection, VectorStore};

struct StoredCollection {
    handle: CollectionHandle,
    created_at: DateTime<Utc>,
    entries: Vec<(Chunk, Vec<f32>)>,
}

/// In-memory vector store.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, StoredCollection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> RagError {
    RagError::Store("in-memory store lock poisoned".to_string())
}

/// Find the live collection behind `handle`; a recreated collection with the
/// same name but a new id does not match.
fn live<'a>(
    map: &'a HashMap<String, StoredCollection>,
    handle: &CollectionHandle,
) -> Result<&'a StoredCollection> {
    map.get(&handle.name)
        .filter(|c| c.handle.id == handle.id)
        .ok_or_else(|| RagError::CollectionNotFound(handle.name.clone()))
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn get_or_create_collection(&self, spec: NewCollection<'_>) -> Result<CollectionHandle> {
        let mut map = self.collections.write().map_err(poisoned)?;
        let stored = map
            .entry(spec.name.to_string())
            .or_insert_with(|| StoredCollection {
                handle: CollectionHandle {
                    id: Uuid::new_v4().to_string(),
                    name: spec.name.to_string(),
                    fingerprint: spec.fingerprint.to_string(),
                    model: spec.model.to_string(),
                    dims: spec.dims,
                },
                created_at: Utc::now(),
                entries: Vec::new(),
            });
        Ok(stored.handle.clone())
    }

    async fn find_collection(&self, name: &str) -> Result<Option<CollectionHandle>> {
        let map = self.collections.read().map_err(poisoned)?;
        Ok(map.get(name).map(|c| c.handle.clone()))
    }

    async fn count(&self, handle: &CollectionHandle) -> Result<usize> {
        let map = self.collections.read().map_err(poisoned)?;
        Ok(live(&map, handle)?.entries.len())
    }

    async fn insert(
        &self,
        handle: &CollectionHandle,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        check_insert(handle, chunks, vectors)?;
        let mut map = self.collections.write().map_err(poisoned)?;
        let stored = map
            .get_mut(&handle.name)
            .filter(|c| c.handle.id == handle.id)
            .ok_or_else(|| RagError::CollectionNotFound(handle.name.clone()))?;

        let mut seen: HashSet<String> = stored.entries.iter().map(|(c, _)| c.id.clone()).collect();
        for (chunk, vector) in chunks.iter().zip(vectors) {
            if seen.insert(chunk.id.clone()) {
                stored.entries.push((chunk.clone(), vector.clone()));
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        handle: &CollectionHandle,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let map = self.collections.read().map_err(poisoned)?;
        let stored = live(&map, handle)?;
        let mut hits: Vec<ScoredChunk> = stored
            .entries
            .iter()
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query_vec, vector),
            })
            .collect();
        sort_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete_collection(&self, handle: &CollectionHandle) -> Result<()> {
        let mut map = self.collections.write().map_err(poisoned)?;
        if map
            .get(&handle.name)
            .is_some_and(|c| c.handle.id == handle.id)
        {
            map.remove(&handle.name);
        }
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let map = self.collections.read().map_err(poisoned)?;
        let mut infos: Vec<CollectionInfo> = map
            .values()
            .map(|c| CollectionInfo {
                name: c.handle.name.clone(),
                model: c.handle.model.clone(),
                dims: c.handle.dims,
                chunk_count: c.entries.len(),
                created_at: c.created_at,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;

    fn spec(name: &str) -> NewCollection<'_> {
        NewCollection {
            name,
            fingerprint: "fp",
            model: "test-model",
            dims: 2,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = InMemoryStore::new();
        let a = store.get_or_create_collection(spec("pdfs_a")).await.unwrap();
        let b = store.get_or_create_collection(spec("pdfs_a")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.list_collections().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = InMemoryStore::new();
        let handle = store.get_or_create_collection(spec("pdfs_a")).await.unwrap();
        let mut chunks = chunk_text("a.pdf", "first", 100, 0);
        chunks.extend(chunk_text("b.pdf", "second", 100, 0));
        store
            .insert(&handle, &chunks, &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .await
            .unwrap();

        let hits = store.search(&handle, &[0.1, 0.9], 2).await.unwrap();
        assert_eq!(hits[0].chunk.text, "second");
        assert_eq!(hits[1].chunk.text, "first");
        assert_eq!(store.search(&handle, &[0.1, 0.9], 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_wrong_dims_without_partial_write() {
        let store = InMemoryStore::new();
        let handle = store.get_or_create_collection(spec("pdfs_a")).await.unwrap();
        let mut chunks = chunk_text("a.pdf", "one", 100, 0);
        chunks.extend(chunk_text("b.pdf", "two", 100, 0));
        let err = store
            .insert(&handle, &chunks, &[vec![1.0, 0.0], vec![1.0, 0.0, 0.0]])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Store(_)));
        assert_eq!(store.count(&handle).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_chunk_ids_skipped() {
        let store = InMemoryStore::new();
        let handle = store.get_or_create_collection(spec("pdfs_a")).await.unwrap();
        let chunks = chunk_text("a.pdf", "same", 100, 0);
        store.insert(&handle, &chunks, &[vec![1.0, 0.0]]).await.unwrap();
        store.insert(&handle, &chunks, &[vec![1.0, 0.0]]).await.unwrap();
        assert_eq!(store.count(&handle).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deleted_collection_unreachable() {
        let store = InMemoryStore::new();
        let handle = store.get_or_create_collection(spec("pdfs_a")).await.unwrap();
        store.delete_collection(&handle).await.unwrap();

        let err = store.search(&handle, &[1.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, RagError::CollectionNotFound(_)));
        assert!(store.find_collection("pdfs_a").await.unwrap().is_none());

        // A recreated collection gets a fresh id; the stale handle stays dead.
        let fresh = store.get_or_create_collection(spec("pdfs_a")).await.unwrap();
        assert_ne!(fresh.id, handle.id);
        assert!(store.count(&handle).await.is_err());
    }
}
