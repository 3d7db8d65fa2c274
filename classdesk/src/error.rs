//! Error types for ClassDesk
//!
//! All errors use thiserror for structured error handling.
//! `StoreError` covers the remote document store; `AppError` is what
//! services and the command line surface.

use thiserror::Error;

/// Failure of a remote document store operation.
///
/// Every variant keeps the underlying cause so callers can report it as-is.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Document store returned {status} ({code}): {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Malformed document {collection}/{id}: {source}")]
    Decode {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot encode document: {0}")]
    Encode(String),

    #[error("Unexpected response from document store: {0}")]
    Protocol(String),

    #[error("Concurrent request failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub type Result<T> = std::result::Result<T, AppError>;
