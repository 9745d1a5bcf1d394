//! Zine Document Store
//!
//! A local document store with incremental map/reduce views:
//! - Documents keyed by id, first write wins
//! - One design document declaring which views exist
//! - Views built lazily on read, or in the background after a read
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │  documents.db    │────▶│  index/views.db  │
//! │  (seq, id, body) │ map │  (view, key, id) │
//! └──────────────────┘     └──────────────────┘
//!          ▲                        │
//!     bulk_insert            query(view, options)
//! ```

pub mod engine;
pub mod error;
pub mod types;

pub use engine::{SqliteStore, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use types::{
    BulkResult, BulkStatus, Document, QueryOptions, Row, Staleness, StoreInfo, DESIGN_PREFIX,
};

use crate::index::{DesignDocument, IndexKind};
use async_trait::async_trait;

/// Operations the ingestion pipeline and query layer need from a store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Document count (design documents included) and latest sequence
    async fn info(&self) -> StoreResult<StoreInfo>;

    /// Fetch one document by id
    async fn get(&self, id: &str) -> StoreResult<Document>;

    /// Insert many documents; existing ids are reported as conflicts
    async fn bulk_insert(&self, docs: Vec<Document>) -> StoreResult<Vec<BulkResult>>;

    /// Install or overwrite the design document
    async fn put_design(&self, design: DesignDocument) -> StoreResult<()>;

    /// Read a view
    async fn query(&self, view: IndexKind, options: QueryOptions) -> StoreResult<Vec<Row>>;
}
