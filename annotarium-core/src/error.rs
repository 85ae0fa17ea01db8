//! Core error types for Annotarium

use thiserror::Error;

/// Main error type for Annotarium operations
#[derive(Error, Debug)]
pub enum AnnotariumError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Path error: {0}")]
    Path(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias for Annotarium operations
pub type AnnotariumResult<T> = Result<T, AnnotariumError>;

// Conversion implementations for common error types
impl From<serde_json::Error> for AnnotariumError {
    fn from(err: serde_json::Error) -> Self {
        AnnotariumError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for AnnotariumError {
    fn from(err: anyhow::Error) -> Self {
        AnnotariumError::Other(err.to_string())
    }
}
