//! Ingestion error types

use crate::store::StoreError;
use thiserror::Error;

/// Errors raised while discovering or fetching raw posts
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GET {url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("Source misconfigured: {0}")]
    Config(String),
}

impl SourceError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        SourceError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that stop an installation
#[derive(Error, Debug)]
pub enum IngestError {
    /// The store already holds every discovered post plus the design document
    #[error("Already installed, skipping setup")]
    AlreadyInstalled,

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;
