//! Zine Index Structures
//!
//! Secondary indexes are incremental map/reduce views over the posts:
//!
//! - **definitions**: the five views (`all`, `tag`, `date`, `text`, `person`)
//!   described as data, each map a pure function of one document
//! - **ViewIndex**: SQLite-backed B-tree holding the emitted rows
//! - **IndexManager**: which views are installed and how far each is built
//!
//! # Architecture
//!
//! ```text
//! bulk insert → documents (seq 1..n)
//!                     ↓  (view older than seq n)
//! IndexKind::map(doc) → [(key, doc_id), ...]
//!                     ↓
//! ViewIndex: replace rows for doc_id, advance view to seq n
//!                     ↓
//! Query: rows by key / all rows / counts grouped by key
//! ```

mod definitions;
mod manager;
mod view_index;

pub use definitions::{
    date_key, tokenize, DesignDocument, IndexEntry, IndexKind, Reduce, DESIGN_ID,
};
pub use manager::IndexManager;
pub use view_index::ViewIndex;

use serde::Serialize;

/// Build progress of one view
#[derive(Debug, Clone, Serialize)]
pub struct ViewStats {
    pub view: IndexKind,
    /// Store sequence the view has caught up to
    pub indexed_seq: i64,
    /// Number of materialized rows
    pub rows: u64,
}

/// Statistics about the installed views
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub design_installed: bool,
    pub views: Vec<ViewStats>,
}
