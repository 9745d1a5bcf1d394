//! Query error types
//!
//! Defines the error conditions surfaced by the read side.

use crate::store::StoreError;
use thiserror::Error;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// Store layer error that is not worth retrying
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The operation kept hitting a transient condition
    #[error("{operation} gave up after {attempts} attempts")]
    RetriesExhausted { operation: String, attempts: u32 },
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
