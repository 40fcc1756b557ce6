//! Error types for ragcite.

use thiserror::Error;

/// Main error type for ragcite operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed options, filters or requests, rejected before any work starts
    #[error("validation error: {0}")]
    Validation(String),

    /// Chunker construction failed
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkError),

    /// Embedding provider call failed
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    /// Vector backend call failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Completion provider call failed
    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    /// Unknown document or conversation
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation was aborted through its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the failure came from an external provider or backend.
    ///
    /// Callers own retry policy; nothing inside ragcite retries.
    #[must_use]
    pub fn is_provider(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_) | Self::Store(_) | Self::Completion(_)
        )
    }
}

/// Chunking errors.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Embedding errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Vector backend errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store initialization failed: {0}")]
    Init(String),

    #[error("upsert failed: {0}")]
    Upsert(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("delete failed: {0}")]
    Delete(String),
}

/// Completion provider errors.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(String),

    #[error("invalid completion response: {0}")]
    Response(String),

    #[error("completion stream failed: {0}")]
    Stream(String),
}

/// Result type alias for ragcite operations.
pub type Result<T> = std::result::Result<T, Error>;
