//! Error types shared across the workspace.
//!
//! Each variant corresponds to one failure class a caller may want to react
//! to differently: misconfiguration, a missing or unusable index, a busy
//! pipeline, or a failing model service.

use thiserror::Error;

/// Unified error type.
///
/// Library code never panics on bad input; it returns one of these.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid configuration or parameters (chunking, `k`, providers).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chunk and vector counts or vector lengths disagree.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// No usable index: never built, missing on disk, corrupt or incompatible.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// The pipeline is ingesting and cannot serve the request yet.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// The embedding model call failed.
    #[error("Embedding service error: {0}")]
    Embedding(String),

    /// The language model call failed.
    #[error("Generation error: {0}")]
    Generation(String),

    /// The prompt template is malformed.
    #[error("Template error: {0}")]
    Template(String),

    /// Writing the persisted index failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A source document could not be read or extracted.
    #[error("Document error: {0}")]
    Document(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// True when the error means "build the index (again)".
    pub fn needs_rebuild(&self) -> bool {
        matches!(self, AppError::IndexNotFound(_))
    }

    /// True for downstream model failures a caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Embedding(_) | AppError::Generation(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
