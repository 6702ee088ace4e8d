//! Document ingestion: extraction → chunking.
//!
//! The [`Ingestor`] turns uploaded [`Document`]s into [`Chunk`]s. Text is
//! pulled out page by page through a [`PageExtractor`]; the PDF extractor
//! lives in the app crate, and [`Utf8PageExtractor`] handles plain text and
//! Markdown here.
//!
//! A document that fails extraction is logged and skipped. The batch only
//! fails when nothing at all could be chunked.
//!
//! Extraction is async so backends can move CPU-bound parsing off the
//! executor and bound it with a timeout.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::chunk::chunk_pages;
use crate::error::{RagError, Result};
use crate::models::{Chunk, Document, Page};

/// Extracts per-page text from a document's bytes.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Whether this extractor handles the given document.
    fn supports(&self, document: &Document) -> bool;

    /// Return the text of each page, in page order.
    async fn extract_pages(&self, document: &Document) -> AnyResult<Vec<String>>;
}

/// Plain-text extractor for `.txt` and `.md` files.
///
/// Form feeds (`\x0c`) split pages; a file without one is a single page.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8PageExtractor;

#[async_trait]
impl PageExtractor for Utf8PageExtractor {
    fn supports(&self, document: &Document) -> bool {
        matches!(document.extension().as_deref(), Some("txt" | "md"))
    }

    async fn extract_pages(&self, document: &Document) -> AnyResult<Vec<String>> {
        let text = std::str::from_utf8(&document.bytes)
            .map_err(|e| anyhow::anyhow!("{} is not valid UTF-8: {}", document.name, e))?;
        Ok(text.split('\x0c').map(str::to_string).collect())
    }
}

/// Splits documents into overlapping chunks.
pub struct Ingestor {
    extractors: Vec<Box<dyn PageExtractor>>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Ingestor {
    /// Create an ingestor with only the plain-text extractor registered.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            extractors: vec![Box::new(Utf8PageExtractor)],
            chunk_size,
            chunk_overlap,
        }
    }

    /// Register an extractor. Earlier registrations win when several match.
    pub fn with_extractor(mut self, extractor: impl PageExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    pub fn with_boxed_extractor(mut self, extractor: Box<dyn PageExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Extract and chunk every document.
    ///
    /// Fails with [`RagError::NoDocuments`] for an empty input and with
    /// [`RagError::NoExtractableContent`] when no document yields a chunk.
    pub async fn ingest(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        if documents.is_empty() {
            return Err(RagError::NoDocuments);
        }

        let mut chunks = Vec::new();
        for document in documents {
            let pages = match self.pages(document).await {
                Ok(pages) => pages,
                Err(e) => {
                    warn!(document = %document.name, error = %e, "skipping document");
                    continue;
                }
            };
            let doc_chunks = chunk_pages(&pages, self.chunk_size, self.chunk_overlap);
            debug!(
                document = %document.name,
                pages = pages.len(),
                chunks = doc_chunks.len(),
                "document chunked"
            );
            chunks.extend(doc_chunks);
        }

        if chunks.is_empty() {
            return Err(RagError::NoExtractableContent {
                documents: documents.len(),
            });
        }
        Ok(chunks)
    }

    async fn pages(&self, document: &Document) -> AnyResult<Vec<Page>> {
        let extractor = self
            .extractors
            .iter()
            .find(|x| x.supports(document))
            .ok_or_else(|| anyhow::anyhow!("unsupported document type: {}", document.name))?;

        Ok(extractor
            .extract_pages(document)
            .await?
            .into_iter()
            .enumerate()
            .map(|(index, text)| Page {
                document: document.name.clone(),
                index,
                text,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingExtractor;

    #[async_trait]
    impl PageExtractor for FailingExtractor {
        fn supports(&self, document: &Document) -> bool {
            document.extension().as_deref() == Some("pdf")
        }

        async fn extract_pages(&self, _document: &Document) -> AnyResult<Vec<String>> {
            anyhow::bail!("corrupt xref table")
        }
    }

    fn text_doc(name: &str, text: &str) -> Document {
        Document::new(name, text.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_empty_set_is_no_documents() {
        let err = Ingestor::new(1500, 100).ingest(&[]).await.unwrap_err();
        assert!(matches!(err, RagError::NoDocuments));
    }

    #[tokio::test]
    async fn test_whitespace_only_is_no_extractable_content() {
        let err = Ingestor::new(1500, 100)
            .ingest(&[text_doc("blank.txt", "   \n\n \t")])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NoExtractableContent { documents: 1 }));
    }

    #[tokio::test]
    async fn test_failing_document_skipped() {
        let ingestor = Ingestor::new(1500, 100).with_extractor(FailingExtractor);
        let chunks = ingestor
            .ingest(&[
                Document::new("broken.pdf", b"%PDF-garbage".to_vec()),
                text_doc("notes.txt", "The capital of France is Paris."),
            ])
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].document, "notes.txt");
    }

    #[tokio::test]
    async fn test_unsupported_extension_skipped() {
        let err = Ingestor::new(1500, 100)
            .ingest(&[Document::new("image.png", vec![0x89, 0x50])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NoExtractableContent { .. }));
    }

    #[tokio::test]
    async fn test_form_feed_splits_pages() {
        let chunks = Ingestor::new(20, 0)
            .ingest(&[text_doc("book.md", "first page text\x0csecond page text")])
            .await
            .unwrap();
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].page, 0);
        assert_eq!(chunks.last().unwrap().page, 1);
    }

    #[tokio::test]
    async fn test_chunk_ids_stable_across_runs() {
        let ingestor = Ingestor::new(50, 10);
        let doc = text_doc("a.txt", &"lorem ipsum dolor sit amet. ".repeat(20));
        let a = ingestor.ingest(std::slice::from_ref(&doc)).await.unwrap();
        let b = ingestor.ingest(&[doc]).await.unwrap();
        assert_eq!(a, b);
    }
}
