//! Configuration for the document Q&A system

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::retrieval::Metric;

/// Environment variable pointing at a TOML configuration file
pub const CONFIG_PATH_ENV: &str = "DOCQA_CONFIG";
/// Environment variable overriding the index storage directory
pub const INDEX_PATH_ENV: &str = "DOCQA_INDEX_PATH";
/// Environment variable setting the folder ingestion root
pub const FOLDER_ROOT_ENV: &str = "DOCQA_FOLDER_ROOT";
/// Environment variable holding the OpenAI API key
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Completion model configuration
    pub llm: LlmConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Persistent index configuration
    pub index: IndexConfig,
    /// Conversation memory configuration
    pub memory: MemoryConfig,
    /// Ingestion processing configuration
    pub processing: ProcessingConfig,
    /// Document source configuration
    pub ingestion: IngestionConfig,
}

impl RagConfig {
    /// Parse a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("invalid TOML: {}", e)))
    }

    /// Load configuration from `DOCQA_CONFIG` (or defaults) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(OPENAI_API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(path) = std::env::var(INDEX_PATH_ENV) {
            if !path.trim().is_empty() {
                self.index.storage_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var(FOLDER_ROOT_ENV) {
            if !path.trim().is_empty() {
                self.ingestion.folder_root = Some(PathBuf::from(path));
            }
        }
    }

    /// Check invariants the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be greater than 0".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be greater than 0".into()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be greater than 0".into()));
        }
        if self.memory.max_turns.is_some_and(|max| max < 2) {
            return Err(Error::Config(
                "memory.max_turns must keep at least one exchange (2 turns)".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Config(format!(
                "llm.temperature must be within [0, 2], got {}",
                self.llm.temperature
            )));
        }
        let needs_key = self.llm.provider == ProviderKind::OpenAi
            || self.embeddings.provider == ProviderKind::OpenAi;
        if needs_key && self.llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(Error::Config(format!(
                "OpenAI provider selected but no API key configured (set {})",
                OPENAI_API_KEY_ENV
            )));
        }
        Ok(())
    }

    /// Default model settings for new sessions
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            model_name: self.llm.model_name.clone(),
            temperature: self.llm.temperature,
        }
    }
}

/// Remote model backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI HTTP API
    #[default]
    OpenAi,
    /// Local Ollama server
    Ollama,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend serving the embedding model
    pub provider: ProviderKind,
    /// Model to use
    pub model: String,
    /// Embedding dimensions (1536 for text-embedding-3-small, 768 for nomic-embed-text)
    pub dimensions: usize,
    /// Texts per embedding request
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            batch_size: 64,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of one page
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Completion model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend serving the completion model
    pub provider: ProviderKind,
    /// Base URL (defaults depend on the provider)
    pub base_url: Option<String>,
    /// API key (OpenAI only)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Generation model name
    pub model_name: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for failed embedding requests (completions are never retried)
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            base_url: None,
            api_key: None,
            model_name: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl LlmConfig {
    /// Base URL for the configured provider
    pub fn resolved_base_url(&self, provider: ProviderKind) -> String {
        match (&self.base_url, provider) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, ProviderKind::OpenAi) => "https://api.openai.com/v1".to_string(),
            (None, ProviderKind::Ollama) => "http://localhost:11434".to_string(),
        }
    }
}

/// Model selection bound to a session's answer synthesizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        LlmConfig::default().into()
    }
}

impl From<LlmConfig> for ModelConfig {
    fn from(llm: LlmConfig) -> Self {
        Self {
            model_name: llm.model_name,
            temperature: llm.temperature,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages placed in each prompt
    pub top_k: usize,
    /// Similarity metric for newly built indexes
    pub metric: Metric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            metric: Metric::Cosine,
        }
    }
}

/// Persistent index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Snapshot directory shared by upload and folder ingestion
    pub storage_path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        let storage_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docqa-rag")
            .join("vectorstore");

        Self { storage_path }
    }
}

/// Conversation memory configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum turns retained per session (unbounded when absent)
    pub max_turns: Option<usize>,
}

/// Document source configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IngestionConfig {
    /// Only folders under this directory may be ingested over HTTP
    /// (folder ingestion is disabled when absent)
    pub folder_root: Option<PathBuf>,
}

/// Ingestion processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Documents loaded and chunked concurrently
    pub parallel_documents: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_documents: num_cpus::get().clamp(1, 8),
        }
    }
}
