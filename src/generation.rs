//! Generation provider implementations.
//!
//! Concrete [`Generator`] backends:
//! - **[`GeminiGenerator`]**: Google Gemini `generateContent` (default,
//!   `gemini-1.5-flash`). Attachments are sent as base64 `inline_data` parts.
//! - **[`OllamaGenerator`]**: local Ollama `/api/generate`.
//! - **[`OpenAIGenerator`]**: OpenAI chat completions.
//! - **[`DisabledGenerator`]**: always fails.
//!
//! API keys are read when a request is made, not at construction, so commands
//! that never generate (`index`, `collections`) work without them.

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use pdfchat_core::generation::{GenerateRequest, GenerateResponse, Generator};

use crate::config::GenerationConfig;
use crate::retry;

const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OLLAMA_URL: &str = "http://localhost:11434";
const OPENAI_URL: &str = "https://api.openai.com/v1";

fn api_key(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow::anyhow!("{} environment variable not set", var))
}

fn client(config: &GenerationConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn required_model(config: &GenerationConfig, provider: &str) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("generation.model required for {} provider", provider))
}

// ============ Disabled Provider ============

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _request: &GenerateRequest) -> Result<GenerateResponse> {
        bail!("Generation provider is disabled")
    }
}

// ============ Gemini Provider ============

/// Generator using the Google Gemini API. Requires `GOOGLE_API_KEY`.
pub struct GeminiGenerator {
    client: reqwest::Client,
    model: String,
    url: String,
    temperature: f32,
    max_retries: u32,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: client(config)?,
            model: required_model(config, "Gemini")?,
            url: config.url.clone().unwrap_or_else(|| GEMINI_URL.to_string()),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    fn body(&self, request: &GenerateRequest) -> serde_json::Value {
        let b64 = base64::engine::general_purpose::STANDARD;
        let mut parts = vec![serde_json::json!({ "text": request.prompt })];
        parts.extend(request.attachments.iter().map(|a| {
            serde_json::json!({
                "inline_data": {
                    "mime_type": a.mime_type,
                    "data": b64.encode(&a.data),
                }
            })
        }));
        serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "temperature": self.temperature },
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let key = api_key("GOOGLE_API_KEY")?;
        let body = self.body(request);
        let endpoint = format!(
            "{}/models/{}:generateContent",
            self.url.trim_end_matches('/'),
            self.model
        );
        let json = retry::send_json("Gemini", self.max_retries, || {
            self.client
                .post(&endpoint)
                .header("x-goog-api-key", &key)
                .json(&body)
        })
        .await?;
        parse_gemini_response(&json)
    }
}

fn parse_gemini_response(json: &serde_json::Value) -> Result<GenerateResponse> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates");
            anyhow::anyhow!("Invalid Gemini response: {}", reason)
        })?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    Ok(GenerateResponse { text })
}

// ============ Ollama Provider ============

/// Generator using a local Ollama instance's `/api/generate` endpoint.
///
/// Image attachments are passed through `images`; other attachments are
/// dropped with a warning.
pub struct OllamaGenerator {
    client: reqwest::Client,
    model: String,
    url: String,
    temperature: f32,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: client(config)?,
            model: required_model(config, "Ollama")?,
            url: config.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string()),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let b64 = base64::engine::general_purpose::STANDARD;
        let mut images = Vec::new();
        for a in &request.attachments {
            if a.mime_type.starts_with("image/") {
                images.push(b64.encode(&a.data));
            } else {
                warn!(attachment = %a.name, mime = %a.mime_type, "Ollama ignores non-image attachments");
            }
        }
        let mut body = serde_json::json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        if !images.is_empty() {
            body["images"] = serde_json::json!(images);
        }
        let endpoint = format!("{}/api/generate", self.url.trim_end_matches('/'));
        let json = retry::send_json("Ollama", self.max_retries, || {
            self.client.post(&endpoint).json(&body)
        })
        .await?;
        let text = json
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response"))?;
        Ok(GenerateResponse {
            text: text.to_string(),
        })
    }
}

// ============ OpenAI Provider ============

/// Generator using OpenAI chat completions. Requires `OPENAI_API_KEY`.
pub struct OpenAIGenerator {
    client: reqwest::Client,
    model: String,
    url: String,
    temperature: f32,
    max_retries: u32,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: client(config)?,
            model: required_model(config, "OpenAI")?,
            url: config.url.clone().unwrap_or_else(|| OPENAI_URL.to_string()),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let key = api_key("OPENAI_API_KEY")?;
        if !request.attachments.is_empty() {
            warn!(count = request.attachments.len(), "OpenAI generator ignores attachments");
        }
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": self.temperature,
        });
        let endpoint = format!("{}/chat/completions", self.url.trim_end_matches('/'));
        let json = retry::send_json("OpenAI", self.max_retries, || {
            self.client.post(&endpoint).bearer_auth(&key).json(&body)
        })
        .await?;
        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;
        Ok(GenerateResponse {
            text: text.to_string(),
        })
    }
}

// ============ Timeout decorator ============

/// Bounds every call of the wrapped generator with `tokio::time::timeout`.
pub struct TimeoutGenerator {
    inner: Arc<dyn Generator>,
    timeout: Duration,
}

impl TimeoutGenerator {
    pub fn new(inner: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Generator for TimeoutGenerator {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        match tokio::time::timeout(self.timeout, self.inner.generate(request)).await {
            Ok(result) => result,
            Err(_) => bail!(
                "generation with {} timed out after {}s",
                self.inner.model_name(),
                self.timeout.as_secs()
            ),
        }
    }
}

/// Create the configured [`Generator`], wrapped in a [`TimeoutGenerator`].
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledGenerator`] |
/// | `"gemini"` | [`GeminiGenerator`] |
/// | `"ollama"` | [`OllamaGenerator`] |
/// | `"openai"` | [`OpenAIGenerator`] |
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    let inner: Arc<dyn Generator> = match config.provider.as_str() {
        "disabled" => Arc::new(DisabledGenerator),
        "gemini" => Arc::new(GeminiGenerator::new(config)?),
        "ollama" => Arc::new(OllamaGenerator::new(config)?),
        "openai" => Arc::new(OpenAIGenerator::new(config)?),
        other => bail!("Unknown generation provider: {}", other),
    };
    let budget = retry::total_budget(Duration::from_secs(config.timeout_secs), config.max_retries);
    Ok(Arc::new(TimeoutGenerator::new(inner, budget)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfchat_core::generation::Attachment;

    #[test]
    fn test_gemini_body_inlines_attachments() {
        let generator = GeminiGenerator::new(&GenerationConfig::default()).unwrap();
        let request = GenerateRequest::new("describe").with_attachment(Attachment {
            name: "a.pdf".into(),
            mime_type: "application/pdf".into(),
            data: b"%PDF".to_vec(),
        });
        let body = generator.body(&request);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "describe");
        assert_eq!(
            body["contents"][0]["parts"][1]["inline_data"]["data"],
            "JVBERg=="
        );
        let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_parse_gemini_response_joins_parts() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "Paris" }, { "text": "." }] } }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap().text, "Paris.");
    }

    #[test]
    fn test_parse_gemini_blocked_prompt() {
        let json = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_gemini_response(&json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_disabled_generator_errors() {
        let err = DisabledGenerator
            .generate(&GenerateRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_create_generator_is_lazy_about_keys() {
        let generator = create_generator(&GenerationConfig::default()).unwrap();
        assert_eq!(generator.model_name(), "gemini-1.5-flash");
    }
}
