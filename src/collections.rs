//! `collections` and `clear` commands.
//!
//! Collections are named from the fingerprint of their document set, so
//! `clear` recomputes the name from the same paths that built it.

use anyhow::{bail, Result};
use std::path::PathBuf;

use pdfchat_core::fingerprint::{collection_name, fingerprint};
use pdfchat_core::models::Document;
use pdfchat_core::store::VectorStore;

use crate::config::Config;
use crate::db;
use crate::files::load_documents;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

async fn open_store(config: &Config) -> Result<SqliteStore> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    Ok(SqliteStore::new(pool))
}

/// `pdfchat collections`
pub async fn run_collections(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let collections = store.list_collections().await?;

    if collections.is_empty() {
        println!("No collections. Run `pdfchat index <files>` to create one.");
        return Ok(());
    }

    println!(
        "{:<24} {:>8} {:<24} {:>6}  CREATED",
        "COLLECTION", "CHUNKS", "MODEL", "DIMS"
    );
    for c in &collections {
        println!(
            "{:<24} {:>8} {:<24} {:>6}  {}",
            c.name,
            c.chunk_count,
            c.model,
            c.dims,
            c.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Name of the collection that `documents` index into.
pub fn collection_for(documents: &[Document]) -> String {
    let keys: Vec<_> = documents.iter().map(Document::key).collect();
    collection_name(&fingerprint(&keys))
}

/// `pdfchat clear <paths...>`
pub async fn run_clear(config: &Config, paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        bail!("No files given. Pass the same files that were indexed.");
    }
    let documents = load_documents(paths, &config.files)?;
    let name = collection_for(&documents);

    let store = open_store(config).await?;
    match store.find_collection(&name).await? {
        Some(handle) => {
            store.delete_collection(&handle).await?;
            println!("Deleted collection {}", name);
        }
        None => println!("No collection {} for these files.", name),
    }
    Ok(())
}
