//! Error types for the storage layer.

use thiserror::Error;

/// Errors that can occur in a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No chunk with the given id.
    #[error("chunk {0} not found")]
    ChunkNotFound(i64),

    /// No session for the given chat id.
    #[error("session for chat {0} not found")]
    SessionNotFound(i64),

    /// No session for the given link token.
    #[error("session with token {0} not found")]
    TokenNotFound(String),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
