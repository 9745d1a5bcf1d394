//! Document store error types
//!
//! Defines all errors that can occur in the store layer.

use thiserror::Error;

/// Errors that can occur in the document store
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite operation failed
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Serialization/deserialization of a document body failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No document with this id
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The view has not been installed yet (no design document declares it)
    #[error("Index missing: {0}")]
    IndexMissing(String),

    /// Query options that cannot be combined
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),

    /// A blocking view build task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// True for the transient "view not built yet" condition
    pub fn is_index_missing(&self) -> bool {
        matches!(self, StoreError::IndexMissing(_))
    }

    /// True when a point lookup found nothing
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
