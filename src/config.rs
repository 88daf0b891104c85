use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub askrag: AskragConfig,
    pub embeddings: EmbeddingsConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub encyclopedia: EncyclopediaConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Storage and logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AskragConfig {
    /// Directory uploaded files are written to before ingestion.
    pub data_dir: PathBuf,
    /// SQLite file holding the active vector index.
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub api_key_env: String,
    #[serde(default = "default_embeddings_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Chat completion (generation collaborator) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Label reported as `trace.provider` for generated answers.
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_client_timeout_secs")]
    pub timeout_secs: u64,
}

/// Wikipedia lookup configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EncyclopediaConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_sentences")]
    pub sentences: usize,
    #[serde(default = "default_encyclopedia_timeout_secs")]
    pub timeout_secs: u64,
}

/// Answer router configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_collaborator_timeout_secs")]
    pub collaborator_timeout_secs: u64,
    /// Replaces the built-in date-intent phrase list when set.
    #[serde(default)]
    pub date_phrases: Option<Vec<String>>,
    /// Replaces the built-in math operator token list when set.
    #[serde(default)]
    pub math_operators: Option<Vec<String>>,
}

/// Chunking configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_chunk_size_tokens")]
    pub chunk_size_tokens: usize,
    #[serde(default = "default_chunk_overlap_tokens")]
    pub chunk_overlap_tokens: usize,
}

/// Conversation memory configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_capacity")]
    pub capacity: usize,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for EncyclopediaConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            language: default_language(),
            sentences: default_sentences(),
            timeout_secs: default_encyclopedia_timeout_secs(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            collaborator_timeout_secs: default_collaborator_timeout_secs(),
            date_phrases: None,
            math_operators: None,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size_tokens(),
            chunk_overlap_tokens: default_chunk_overlap_tokens(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_memory_capacity(),
        }
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_embeddings_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_generation_provider() -> String {
    "huggingface".to_string()
}

fn default_generation_base_url() -> String {
    "https://router.huggingface.co/v1".to_string()
}

fn default_generation_model() -> String {
    "mistralai/Mistral-7B-Instruct-v0.2".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    256
}

fn default_client_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "en".to_string()
}

fn default_sentences() -> usize {
    1
}

fn default_encyclopedia_timeout_secs() -> u64 {
    10
}

fn default_top_k() -> usize {
    4
}

fn default_collaborator_timeout_secs() -> u64 {
    30
}

fn default_chunk_size_tokens() -> usize {
    250
}

fn default_chunk_overlap_tokens() -> usize {
    25
}

fn default_memory_capacity() -> usize {
    5
}

fn default_http_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in ASKRAG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("ASKRAG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml_str(&config_str)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration without touching the environment or validating it
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        toml::from_str(config_str).context("Failed to parse config.toml")
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !is_local_endpoint(&self.generation.base_url) {
            std::env::var(&self.generation.api_key_env).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable with your inference API token.",
                    self.generation.api_key_env
                )
            })?;
        }

        if self.router.top_k == 0 {
            anyhow::bail!("router.top_k must be greater than 0");
        }

        if self.router.collaborator_timeout_secs == 0 {
            anyhow::bail!("router.collaborator_timeout_secs must be greater than 0");
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            anyhow::bail!("generation.temperature must be between 0.0 and 2.0");
        }

        if self.encyclopedia.sentences == 0 {
            anyhow::bail!("encyclopedia.sentences must be greater than 0");
        }

        if self.memory.capacity == 0 {
            anyhow::bail!("memory.capacity must be greater than 0");
        }

        if self.performance.chunk_size_tokens == 0 {
            anyhow::bail!("performance.chunk_size_tokens must be greater than 0");
        }

        if self.performance.chunk_overlap_tokens >= self.performance.chunk_size_tokens {
            anyhow::bail!("performance.chunk_overlap_tokens must be less than chunk_size_tokens");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.askrag.db_path
    }

    /// Get the upload directory
    pub fn data_dir(&self) -> &Path {
        &self.askrag.data_dir
    }
}

/// Local inference servers (Ollama, vLLM, LM Studio) run without a token.
pub fn is_local_endpoint(base_url: &str) -> bool {
    base_url.contains("localhost") || base_url.contains("127.0.0.1")
}
