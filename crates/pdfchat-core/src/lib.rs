//! # pdfchat core
//!
//! Runtime-agnostic retrieval-augmented generation pipeline: data models,
//! chunking, collection fingerprinting, the store abstraction, capability
//! traits for embedding and generation, and the session orchestrator.
//!
//! This crate contains no sqlx, HTTP clients, filesystem I/O, or PDF parsing.
//! Those live in the `pdfchat` application crate, which plugs concrete
//! backends into the traits defined here.
//!
//! Pipeline for one question:
//!
//! ```text
//! question ─▶ QueryExpander ─▶ Retriever (concurrent searches) ─▶ AnswerSynthesizer ─▶ answer
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod expand;
pub mod fingerprint;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod session;
pub mod store;
pub mod synthesize;

pub use error::{RagError, Result};
pub use session::{IndexSummary, RagSession, RagSessionBuilder, SessionOptions, SessionState};
