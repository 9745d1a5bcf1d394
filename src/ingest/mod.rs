//! Zine Ingestion
//!
//! Turns a folder of flat-file posts into store documents:
//! - **source**: discovers and fetches raw posts (disk, manifest, HTTP)
//! - **parser**: header lines + blank line + body → `Document`
//! - **pipeline**: idempotence check, bulk load, view install and priming

mod error;
pub mod parser;
pub mod pipeline;
pub mod source;

pub use error::{IngestError, IngestResult, SourceError};
pub use parser::parse_post;
pub use pipeline::{is_already_installed, IngestOutcome, IngestSummary, Ingestor, Ready};
pub use source::{
    from_config, parse_manifest, DirectorySource, HttpSource, ManifestSource, PostRef,
    PostSource,
};
