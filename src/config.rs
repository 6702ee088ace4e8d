//! Configuration parsing and validation.
//!
//! pdfchat is configured via a TOML file (default: `config/pdfchat.toml`).
//! Every section is optional; missing values fall back to the defaults below,
//! and a missing file falls back to [`Config::minimal`].
//!
//! # Configuration Sections
//!
//! | Section | Purpose |
//! |---------|---------|
//! | `[db]` | SQLite database path for collections and vectors |
//! | `[chunking]` | Chunk size and overlap in characters |
//! | `[extraction]` | Per-document PDF parse timeout |
//! | `[retrieval]` | Query variants, per-variant top-k, context budget |
//! | `[embedding]` | Embedding provider, model, dims, batching, retry |
//! | `[generation]` | Generation provider, model, temperature, retry |
//! | `[server]` | HTTP bind address |
//! | `[files]` | Globs used when indexing directories |
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/vectors/pdfchat.sqlite"
//!
//! [chunking]
//! chunk_size = 1500
//! chunk_overlap = 100
//!
//! [extraction]
//! timeout_secs = 120
//!
//! [retrieval]
//! query_variants = 3
//! top_k = 4
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [generation]
//! provider = "gemini"
//! model = "gemini-1.5-flash"
//! temperature = 0.3
//!
//! [server]
//! bind = "127.0.0.1:7331"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use pdfchat_core::SessionOptions;

/// Embedding providers accepted in `[embedding] provider`.
pub const EMBEDDING_PROVIDERS: &[&str] = &["disabled", "ollama", "openai", "local"];
/// Generation providers accepted in `[generation] provider`.
pub const GENERATION_PROVIDERS: &[&str] = &["disabled", "gemini", "ollama", "openai"];

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/vectors/pdfchat.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1500
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Upper bound on parsing one PDF.
    #[serde(default = "default_extract_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_extract_timeout_secs(),
        }
    }
}

fn default_extract_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_query_variants")]
    pub query_variants: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Optional cap on the characters of context sent to the model.
    #[serde(default)]
    pub max_context_chars: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            query_variants: default_query_variants(),
            top_k: default_top_k(),
            max_context_chars: None,
        }
    }
}

fn default_query_variants() -> usize {
    3
}
fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: Option<String>,
    #[serde(default = "default_embedding_dims")]
    pub dims: Option<usize>,
    /// Base URL of the provider API. Defaults per provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}
fn default_embedding_model() -> Option<String> {
    Some("nomic-embed-text".to_string())
}
fn default_embedding_dims() -> Option<usize> {
    Some(768)
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            temperature: default_temperature(),
            url: None,
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_model() -> Option<String> {
    Some("gemini-1.5-flash".to_string())
}
fn default_temperature() -> f32 {
    0.3
}
fn default_generation_retries() -> u32 {
    2
}
fn default_generation_timeout_secs() -> u64 {
    60
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7331".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
    ]
}

impl Config {
    /// Defaults for every section; used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Session parameters derived from `[chunking]`, `[retrieval]`, and
    /// `[embedding]`.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
            query_variants: self.retrieval.query_variants,
            top_k: self.retrieval.top_k,
            batch_size: self.embedding.batch_size,
            max_context_chars: self.retrieval.max_context_chars,
        }
    }
}

/// Load `path`, or fall back to [`Config::minimal`] if it does not exist.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        let config = Config::minimal();
        validate(&config)?;
        Ok(config)
    }
}

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate TOML config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be < chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    if config.extraction.timeout_secs == 0 {
        anyhow::bail!("extraction.timeout_secs must be > 0");
    }

    // Validate retrieval
    if config.retrieval.query_variants < 1 {
        anyhow::bail!("retrieval.query_variants must be >= 1");
    }
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.max_context_chars == Some(0) {
        anyhow::bail!("retrieval.max_context_chars must be > 0 when set");
    }

    // Validate embedding
    if !EMBEDDING_PROVIDERS.contains(&config.embedding.provider.as_str()) {
        anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be one of: {}.",
            config.embedding.provider,
            EMBEDDING_PROVIDERS.join(", ")
        );
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Validate generation
    if !GENERATION_PROVIDERS.contains(&config.generation.provider.as_str()) {
        anyhow::bail!(
            "Unknown generation provider: '{}'. Must be one of: {}.",
            config.generation.provider,
            GENERATION_PROVIDERS.join(", ")
        );
    }
    if config.generation.is_enabled() && config.generation.model.is_none() {
        anyhow::bail!(
            "generation.model must be specified when provider is '{}'",
            config.generation.provider
        );
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
