//! # Zine
//!
//! A self-hosted reader: ingests a folder of plain-text posts into a local
//! document store and serves browsing, tag, date, person and full-text
//! queries plus a calendar archive, all over secondary indexes it builds and
//! maintains itself.
//!
//! ## Modules
//!
//! - [`store`]: SQLite document store with incremental map/reduce views
//! - [`index`]: The five view definitions and their materialization
//! - [`ingest`]: Post parser, post sources and the ingestion pipeline
//! - [`query`]: Reads with retry, and the archive builder
//! - [`config`]: TOML configuration with `ZINE_*` overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zine::ingest::{DirectorySource, Ingestor};
//! use zine::query::Reader;
//! use zine::store::{SqliteStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteStore::open(StoreConfig::new("zine_data")).await?);
//!
//!     // Load ./txt/*.md once; later runs see it is already installed
//!     let ingestor = Ingestor::new(store.clone(), Arc::new(DirectorySource::new(".", "txt")));
//!     let ready = ingestor.run().await;
//!     println!("{:?}", ready.outcome);
//!
//!     let reader = Reader::new(store.clone());
//!     if let Some(posts) = reader.get_posts(None).await {
//!         println!("Found {} posts", posts.len());
//!     }
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod index;
pub mod ingest;
pub mod query;
pub mod store;

// Re-export top-level types for convenience
pub use store::{
    Document, DocumentStore, QueryOptions, Row, SqliteStore, Staleness, StoreConfig, StoreError,
    StoreInfo, StoreResult,
};

pub use index::{DesignDocument, IndexKind, IndexManager, IndexStats};

pub use ingest::{
    IngestError, IngestOutcome, IngestSummary, Ingestor, PostRef, PostSource, Ready, SourceError,
};

pub use query::{
    build_archive, ArchiveEntry, FilterKind, PostFilter, QueryError, QueryResult, Reader,
    RetryPolicy,
};

pub use config::{generate_default_config, Config, ConfigError, LoggingConfig, SourceKind};
