//! # pdfchat
//!
//! Chat with your PDFs. Upload a set of documents, and pdfchat extracts their
//! text, chunks and embeds it into a collection keyed by the document set,
//! then answers questions by expanding each question into several phrasings,
//! retrieving context for all of them concurrently, and asking a language
//! model to answer only from that context.
//!
//! The pipeline itself lives in [`pdfchat_core`]; this crate supplies the
//! concrete backends (SQLite vectors, PDF extraction, HTTP providers) and the
//! CLI and HTTP surfaces.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────┐
//! │ PDF / text  │──▶│  Ingest + Embed  │──▶│  SQLite   │
//! │  uploads    │   │ (pdfchat-core)   │   │ vectors   │
//! └─────────────┘   └──────────────────┘   └────┬─────┘
//!                                               │
//!                      ┌────────────────────────┤
//!                      ▼                        ▼
//!                 ┌──────────┐            ┌──────────┐
//!                 │   CLI    │            │   HTTP   │
//!                 │(pdfchat) │            │ sessions │
//!                 └──────────┘            └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pdfchat init                                   # create database
//! pdfchat index ./papers                         # build the knowledge base
//! pdfchat ask "What is the main result?" --files ./papers
//! pdfchat chat ./papers                          # interactive session
//! pdfchat serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`extract`] | PDF page text extraction |
//! | [`retry`] | HTTP retry with backoff |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Generation providers |
//! | [`files`] | Loading documents from paths |
//! | [`pipeline`] | Wiring config into sessions |
//! | [`chat`] | `index`, `ask`, `chat` commands |
//! | [`collections`] | `collections`, `clear` commands |
//! | [`server`] | HTTP sessions API |

pub mod chat;
pub mod collections;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod files;
pub mod generation;
pub mod migrate;
pub mod pipeline;
pub mod retry;
pub mod server;
pub mod sqlite_store;
