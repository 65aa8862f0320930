use std::fmt;
use std::path::PathBuf;

use forklift_index::source::{DEFAULT_BRANCH, DEFAULT_EXTENSIONS, DEFAULT_MAX_FILE_SIZE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunker: ChunkerSection,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenAi,
    HuggingFace,
    /// Deterministic offline embedder; only available with the `mock` feature.
    Mock,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::HuggingFace => "huggingface",
            Self::Mock => "mock",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_model() -> String {
    "nomic-embed-text".into()
}

fn default_dimension() -> usize {
    768
}

fn default_batch_size() -> usize {
    32
}

fn default_embed_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Vector width produced by `model`; the index is created with it.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: default_base_url(),
            model: default_model(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Flat,
    Qdrant,
}

impl StoreBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Qdrant => "qdrant",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".forklift/index")
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection() -> String {
    "forklift_code".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Root directory of the flat backend.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            qdrant_url: default_qdrant_url(),
            collection: default_collection(),
        }
    }
}

fn default_generic_chunk_size() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkerSection {
    /// Character threshold for the line-window fallback.
    #[serde(default = "default_generic_chunk_size")]
    pub generic_chunk_size: usize,
}

impl Default for ChunkerSection {
    fn default() -> Self {
        Self {
            generic_chunk_size: default_generic_chunk_size(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|&e| e.to_owned()).collect()
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_fetch_timeout_secs() -> u64 {
    300
}

fn default_branch() -> String {
    DEFAULT_BRANCH.into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Branch whose entries are tagged with the bare repository name.
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            max_file_size: default_max_file_size(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            default_branch: default_branch(),
        }
    }
}

/// A credential that never prints its value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// API keys read from the environment; never loaded from or written to TOML.
#[derive(Debug, Default, Clone)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
    pub huggingface_api_key: Option<Secret>,
}
