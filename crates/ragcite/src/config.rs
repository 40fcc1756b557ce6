//! Configuration handling for ragcite.
//!
//! The config file is TOML; every section and field is optional and falls
//! back to the defaults below. API keys never live in the file, only the
//! names of the environment variables holding them.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use ragcite_core::ChunkOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkOptions,

    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Completion configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Vector backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load the config file from the default location, or defaults when absent.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::read(&path),
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self =
            toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
        config.chunking.validate().context("Invalid [chunking] section")?;
        Ok(config)
    }

    /// Default config file location.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// Commented sample config with every default spelled out.
    pub fn sample_toml() -> &'static str {
        SAMPLE_TOML
    }
}

/// Embedding provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Offline feature hashing
    #[default]
    Hashing,
    /// OpenAI-compatible `/embeddings` endpoint
    OpenAi,
}

/// Embedding-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider to use
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Model to use (remote providers only)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector dimension
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Max concurrent embedding calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Minimum gap between provider calls (ms)
    #[serde(default)]
    pub min_interval_ms: u64,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_concurrent() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            max_concurrent: default_max_concurrent(),
            min_interval_ms: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Completion-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Chat model
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Response token limit
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Vector backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Remote,
}

/// Vector backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend to use
    #[serde(default)]
    pub kind: BackendKind,

    /// Remote index host
    #[serde(default)]
    pub url: String,

    /// Remote namespace
    #[serde(default)]
    pub namespace: String,

    /// Environment variable holding the remote API key
    #[serde(default = "default_vector_api_key_env")]
    pub api_key_env: String,

    /// Use the memory backend when the remote index cannot be reached
    #[serde(default = "default_fallback_to_memory")]
    pub fallback_to_memory: bool,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_vector_api_key_env() -> String {
    "RAGCITE_VECTOR_API_KEY".to_string()
}

fn default_fallback_to_memory() -> bool {
    true
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: String::new(),
            namespace: String::new(),
            api_key_env: default_vector_api_key_env(),
            fallback_to_memory: default_fallback_to_memory(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks retrieved per question
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Prior messages sent with each question
    #[serde(default = "default_history")]
    pub history: usize,
}

fn default_limit() -> usize {
    5
}

fn default_history() -> usize {
    6
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            history: default_history(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `tracing_subscriber` filter directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Read an API key from the environment variable `name`.
///
/// Empty values count as missing.
pub fn api_key(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Get the XDG data directory for ragcite.
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("RAGCITE_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "ragcite").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the XDG config directory for ragcite.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("RAGCITE_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "ragcite").map(|dirs| dirs.config_dir().to_path_buf())
}

const SAMPLE_TOML: &str = r#"# ragcite configuration

[chunking]
chunk_size = 1000
chunk_overlap = 200
min_chunk_size = 100
max_chunk_size = 2000
respect_sentence_boundaries = true
respect_paragraph_boundaries = true

[embedding]
# "hashing" works offline; "openai" calls an OpenAI-compatible API
provider = "hashing"
model = "text-embedding-3-small"
dimension = 384
base_url = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
max_concurrent = 4
min_interval_ms = 0
timeout_secs = 60

[completion]
model = "gpt-4o-mini"
base_url = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
max_tokens = 1000
temperature = 0.7
timeout_secs = 60

[backend]
# "memory" or "remote"
kind = "memory"
url = ""
namespace = ""
api_key_env = "RAGCITE_VECTOR_API_KEY"
fallback_to_memory = true
timeout_secs = 60

[retrieval]
limit = 5
history = 6

[logging]
level = "info"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = Config::load_from(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.chunking, ChunkOptions::default());
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert!(config.backend.fallback_to_memory);
        assert_eq!(config.retrieval.limit, 5);
        assert_eq!(config.retrieval.history, 6);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections() {
        let file = write_config(
            r#"
[chunking]
chunk_size = 500
chunk_overlap = 50

[embedding]
provider = "openai"

[backend]
kind = "remote"
url = "https://index.example"
"#,
        );
        let config = Config::load_from(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.chunking.max_chunk_size, 2000);
        assert_eq!(config.embedding.provider, EmbeddingProvider::OpenAi);
        assert_eq!(config.embedding.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.backend.kind, BackendKind::Remote);
        assert_eq!(config.backend.url, "https://index.example");
        assert_eq!(config.backend.api_key_env, "RAGCITE_VECTOR_API_KEY");
    }

    #[test]
    fn test_invalid_chunking_rejected() {
        let file = write_config("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n");
        let err = Config::load_from(Some(file.path().to_path_buf())).unwrap_err();
        assert!(format!("{err:#}").contains("chunk_overlap"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let file = write_config("[embedding]\nprovider = \"candle\"\n");
        assert!(Config::load_from(Some(file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Config::load_from(Some(path)).is_err());
    }

    #[test]
    fn test_sample_matches_defaults() {
        let config: Config = toml::from_str(Config::sample_toml()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.chunking, defaults.chunking);
        assert_eq!(config.embedding.model, defaults.embedding.model);
        assert_eq!(config.completion.model, defaults.completion.model);
        assert_eq!(config.completion.max_tokens, defaults.completion.max_tokens);
        assert_eq!(config.backend.kind, defaults.backend.kind);
        assert_eq!(config.retrieval.limit, defaults.retrieval.limit);
    }

    #[test]
    fn test_config_serializes_to_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(text.contains("[embedding]"));
        assert!(text.contains("provider = \"hashing\""));
    }
}
