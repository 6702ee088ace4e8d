//! Deterministic document-set fingerprints.
//!
//! A collection is keyed by the multiset of `(name, size)` pairs of the
//! documents it was built from. Keys are sorted into a canonical order and
//! fed to SHA-256 with length prefixes, so the fingerprint ignores upload
//! order but changes whenever a name or size changes.
//!
//! ```rust
//! use pdfchat_core::fingerprint::{fingerprint, DocumentKey};
//!
//! let a = fingerprint(&[DocumentKey::new("a.pdf", 100), DocumentKey::new("b.pdf", 200)]);
//! let b = fingerprint(&[DocumentKey::new("b.pdf", 200), DocumentKey::new("a.pdf", 100)]);
//! assert_eq!(a, b);
//! ```

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Prefix of every collection name.
pub const COLLECTION_PREFIX: &str = "pdfs_";

/// Hex characters of the fingerprint kept in the collection name.
const NAME_HASH_LEN: usize = 16;

/// Identity of one document for fingerprinting purposes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DocumentKey {
    pub name: String,
    pub size: u64,
}

impl DocumentKey {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// SHA-256 fingerprint (hex) of a document set, independent of input order.
pub fn fingerprint(keys: &[DocumentKey]) -> String {
    let mut sorted: Vec<&DocumentKey> = keys.iter().collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update((sorted.len() as u64).to_le_bytes());
    for key in sorted {
        hasher.update((key.name.len() as u64).to_le_bytes());
        hasher.update(key.name.as_bytes());
        hasher.update(key.size.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Collection name derived from a fingerprint, e.g. `pdfs_3f1c9a0b7d2e4f11`.
pub fn collection_name(fingerprint: &str) -> String {
    let end = fingerprint.len().min(NAME_HASH_LEN);
    format!("{}{}", COLLECTION_PREFIX, &fingerprint[..end])
}
