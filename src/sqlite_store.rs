//! SQLite-backed [`VectorStore`] implementation.
//!
//! Maps each [`VectorStore`] operation to queries against the `collections`,
//! `chunks`, and `chunk_vectors` tables created by [`migrate`](crate::migrate).
//! Search loads the collection's vectors and ranks them by cosine similarity
//! in process, as the in-memory store does.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use pdfchat_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use pdfchat_core::error::{RagError, Result};
use pdfchat_core::models::{Chunk, CollectionHandle, CollectionInfo, ScoredChunk};
use pdfchat_core::store::{check_insert, sort_hits, NewCollection, VectorStore};

/// SQLite implementation of the [`VectorStore`] trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn live(&self, handle: &CollectionHandle) -> Result<()> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM collections WHERE id = ? AND name = ?")
                .bind(&handle.id)
                .bind(&handle.name)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        if exists {
            Ok(())
        } else {
            Err(RagError::CollectionNotFound(handle.name.clone()))
        }
    }
}

fn db_err(e: sqlx::Error) -> RagError {
    RagError::Store(e.to_string())
}

fn handle_from_row(row: &sqlx::sqlite::SqliteRow) -> CollectionHandle {
    let dims: i64 = row.get("dims");
    CollectionHandle {
        id: row.get("id"),
        name: row.get("name"),
        fingerprint: row.get("fingerprint"),
        model: row.get("model"),
        dims: dims as usize,
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn get_or_create_collection(&self, spec: NewCollection<'_>) -> Result<CollectionHandle> {
        let now = chrono::Utc::now().timestamp();
        // A concurrent creator may win the insert; the select below sees its row.
        sqlx::query(
            r#"
            INSERT INTO collections (id, name, fingerprint, model, dims, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(spec.name)
        .bind(spec.fingerprint)
        .bind(spec.model)
        .bind(spec.dims as i64)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.find_collection(spec.name)
            .await?
            .ok_or_else(|| RagError::Store(format!("collection {} vanished after insert", spec.name)))
    }

    async fn find_collection(&self, name: &str) -> Result<Option<CollectionHandle>> {
        let row = sqlx::query(
            "SELECT id, name, fingerprint, model, dims FROM collections WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.as_ref().map(handle_from_row))
    }

    async fn count(&self, handle: &CollectionHandle) -> Result<usize> {
        self.live(handle).await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection_id = ?")
            .bind(&handle.id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count as usize)
    }

    async fn insert(
        &self,
        handle: &CollectionHandle,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        check_insert(handle, chunks, vectors)?;
        self.live(handle).await?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let inserted = sqlx::query(
                r#"
                INSERT INTO chunks (collection_id, id, document, page, chunk_index, text, hash)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection_id, id) DO NOTHING
                "#,
            )
            .bind(&handle.id)
            .bind(&chunk.id)
            .bind(&chunk.document)
            .bind(chunk.page as i64)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            if inserted.rows_affected() == 0 {
                continue;
            }

            sqlx::query(
                "INSERT INTO chunk_vectors (collection_id, chunk_id, embedding) VALUES (?, ?, ?)",
            )
            .bind(&handle.id)
            .bind(&chunk.id)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn search(
        &self,
        handle: &CollectionHandle,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        self.live(handle).await?;
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document, c.page, c.chunk_index, c.text, c.hash, cv.embedding
            FROM chunk_vectors cv
            JOIN chunks c ON c.collection_id = cv.collection_id AND c.id = cv.chunk_id
            WHERE cv.collection_id = ?
            "#,
        )
        .bind(&handle.id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut hits: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let page: i64 = row.get("page");
                ScoredChunk {
                    score: cosine_similarity(query_vec, &blob_to_vec(&blob)),
                    chunk: Chunk {
                        id: row.get("id"),
                        document: row.get("document"),
                        page: page as usize,
                        chunk_index: row.get("chunk_index"),
                        text: row.get("text"),
                        hash: row.get("hash"),
                    },
                }
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete_collection(&self, handle: &CollectionHandle) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("DELETE FROM chunk_vectors WHERE collection_id = ?")
            .bind(&handle.id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM chunks WHERE collection_id = ?")
            .bind(&handle.id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(&handle.id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let rows = sqlx::query(
            r#"
            SELECT col.name, col.model, col.dims, col.created_at,
                   (SELECT COUNT(*) FROM chunks c WHERE c.collection_id = col.id) AS chunk_count
            FROM collections col
            ORDER BY col.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                let dims: i64 = row.get("dims");
                let chunk_count: i64 = row.get("chunk_count");
                let created_at: i64 = row.get("created_at");
                CollectionInfo {
                    name: row.get("name"),
                    model: row.get("model"),
                    dims: dims as usize,
                    chunk_count: chunk_count as usize,
                    created_at: chrono::DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfchat_core::chunk::chunk_text;

    async fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::db::connect_path(&dir.path().join("data/test.sqlite"))
            .await
            .unwrap();
        crate::migrate::apply(&pool).await.unwrap();
        (dir, SqliteStore::new(pool))
    }

    fn spec(name: &str) -> NewCollection<'_> {
        NewCollection {
            name,
            fingerprint: "fp",
            model: "m",
            dims: 2,
        }
    }

    #[tokio::test]
    async fn test_collection_round_trip() {
        let (_dir, store) = store().await;
        let a = store.get_or_create_collection(spec("pdfs_x")).await.unwrap();
        let b = store.get_or_create_collection(spec("pdfs_x")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dims, 2);

        let mut chunks = chunk_text("a.pdf", "alpha", 100, 0);
        chunks.extend(chunk_text("b.pdf", "beta", 100, 0));
        store
            .insert(&a, &chunks, &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .await
            .unwrap();
        // Re-inserting the same chunks is a no-op.
        store
            .insert(&a, &chunks, &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .await
            .unwrap();
        assert_eq!(store.count(&a).await.unwrap(), 2);

        let hits = store.search(&a, &[0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].chunk, chunks[1]);

        let listed = store.list_collections().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].chunk_count, 2);
    }

    #[tokio::test]
    async fn test_delete_removes_vectors() {
        let (_dir, store) = store().await;
        let handle = store.get_or_create_collection(spec("pdfs_y")).await.unwrap();
        let chunks = chunk_text("a.pdf", "alpha", 100, 0);
        store.insert(&handle, &chunks, &[vec![1.0, 0.0]]).await.unwrap();

        store.delete_collection(&handle).await.unwrap();
        assert!(matches!(
            store.search(&handle, &[1.0, 0.0], 3).await,
            Err(RagError::CollectionNotFound(_))
        ));
        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let (_dir, store) = store().await;
        let handle = store.get_or_create_collection(spec("pdfs_z")).await.unwrap();
        let chunks = chunk_text("a.pdf", "alpha", 100, 0);
        let err = store.insert(&handle, &chunks, &[vec![1.0]]).await.unwrap_err();
        assert!(matches!(err, RagError::Store(_)));
        assert_eq!(store.count(&handle).await.unwrap(), 0);
    }
}
