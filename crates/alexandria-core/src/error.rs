//! Error types for alexandria.

use thiserror::Error;

/// Result type alias using alexandria's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for alexandria operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store could not be reached within the startup retry budget
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Graph edge references a node that does not exist
    #[error("Referential error: {0}")]
    Referential(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Blob storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
