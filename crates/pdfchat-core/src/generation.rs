//! Text generation capability.
//!
//! The pipeline treats the language model as a black box: a prompt and
//! optional attachments go in, text comes out, fallibly. Backends (Gemini,
//! Ollama, OpenAI) live in the `pdfchat` app crate.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// A binary attachment sent alongside a prompt (e.g. a PDF or an image).
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// A single generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub attachments: Vec<Attachment>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Text produced by a [`Generator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateResponse {
    pub text: String,
}

/// An external capability that produces text from a prompt.
///
/// Output may be non-deterministic.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-1.5-flash"`).
    fn model_name(&self) -> &str;

    /// Generate text for the request.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;
}
