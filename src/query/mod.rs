//! Zine Query Layer
//!
//! Reads the views on behalf of presentation:
//!
//! - **Reader**: `get_posts`, `get_about`, `get_archive`
//! - **RetryPolicy**: bounded backoff over attempts that race view builds
//! - **Archive**: sparse per-day counts into a contiguous calendar
//!
//! # Examples
//!
//! ```rust,ignore
//! use zine::query::{FilterKind, PostFilter, Reader};
//!
//! let reader = Reader::new(store);
//!
//! // Every dated post, oldest first
//! let posts = reader.get_posts(None).await;
//!
//! // Posts tagged rust or databases
//! let filter = PostFilter::new(FilterKind::Tag, "rust,databases");
//! let posts = reader.get_posts(filter.as_ref()).await;
//!
//! let archive = reader.get_archive().await;
//! ```

mod archive;
mod error;
mod reader;
mod retry;

pub use archive::{build_archive, ArchiveEntry};
pub use error::{QueryError, QueryResult};
pub use reader::{FilterKind, PostFilter, Reader, ABOUT_ID};
pub use retry::{Attempt, RetryPolicy};
