//! Idempotent schema migrations.
//!
//! Three tables back the vector store:
//!
//! - `collections`: one row per indexed document set, unique by name, with
//!   the embedding model and dimensionality its vectors were made with.
//! - `chunks`: chunk text and position, scoped by collection.
//! - `chunk_vectors`: one little-endian `f32` BLOB per chunk.
//!
//! Every statement is `IF NOT EXISTS`, so running migrations repeatedly is
//! safe.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Open the configured database and bring its schema up to date.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Create collections table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            fingerprint TEXT NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create chunks table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            collection_id TEXT NOT NULL,
            id TEXT NOT NULL,
            document TEXT NOT NULL,
            page INTEGER NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            PRIMARY KEY (collection_id, id),
            FOREIGN KEY (collection_id) REFERENCES collections(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create vectors table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            collection_id TEXT NOT NULL,
            chunk_id TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (collection_id, chunk_id),
            FOREIGN KEY (collection_id) REFERENCES collections(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunks_position ON chunks(collection_id, document, chunk_index)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
