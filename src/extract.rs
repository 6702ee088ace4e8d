//! PDF text extraction.
//!
//! [`PdfExtractor`] plugs `pdf-extract` into the core ingestion pipeline as a
//! [`PageExtractor`]. Text comes back per page so chunks can record where they
//! start. Scanned PDFs without a text layer yield empty pages, which the
//! ingestor treats as no content.
//!
//! Parsing runs on the blocking pool under a timeout. `pdf-extract` panics on
//! some malformed inputs (e.g. a page without `/MediaBox`); panics are caught
//! and reported as an ordinary extraction error so the ingestor skips only
//! that document.

use anyhow::Result;
use async_trait::async_trait;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use pdfchat_core::ingest::PageExtractor;
use pdfchat_core::models::Document;

/// Default bound on parsing one PDF.
pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(120);

/// Extraction error (no panic escapes; the ingestor logs it and skips the document).
#[derive(Debug)]
pub enum ExtractError {
    NotPdf(String),
    Pdf(String),
    Panicked(String),
    TimedOut(Duration),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::NotPdf(name) => write!(f, "{} does not look like a PDF", name),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Panicked(msg) => write!(f, "PDF parser crashed: {}", msg),
            ExtractError::TimedOut(limit) => {
                write!(f, "PDF extraction timed out after {}s", limit.as_secs())
            }
        }
    }
}

impl std::error::Error for ExtractError {}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Extracts per-page text from PDF bytes. Blocking; never panics.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(payload) => Err(ExtractError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// [`PageExtractor`] for `.pdf` documents.
#[derive(Debug, Clone, Copy)]
pub struct PdfExtractor {
    timeout: Duration,
}

impl PdfExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_EXTRACT_TIMEOUT)
    }
}

#[async_trait]
impl PageExtractor for PdfExtractor {
    fn supports(&self, document: &Document) -> bool {
        document.extension().as_deref() == Some("pdf") || document.bytes.starts_with(b"%PDF-")
    }

    async fn extract_pages(&self, document: &Document) -> Result<Vec<String>> {
        if !document.bytes.starts_with(b"%PDF-") {
            return Err(ExtractError::NotPdf(document.name.clone()).into());
        }

        let bytes = document.bytes.clone();
        let task = tokio::task::spawn_blocking(move || extract_pdf_pages(&bytes));

        // On timeout the parse thread runs to completion and its result is dropped.
        let joined = tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| ExtractError::TimedOut(self.timeout))?;
        let pages = joined.map_err(|e| ExtractError::Panicked(e.to_string()))??;
        Ok(pages)
    }
}
