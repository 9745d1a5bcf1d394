//! Ingestion Pipeline - populate an empty store from a post source
//!
//! ```text
//! info() + discover() ── doc_count - discovered == 1 ──▶ AlreadyInstalled
//!          │ otherwise
//!          ▼
//! fetch + parse every post (concurrently; any failure aborts before writing)
//!          ▼
//! bulk_insert(all documents)         conflicts logged, never retried
//!          ▼
//! put_design(standard views)
//!          ▼
//! prime each view (UpdateAfter)      builds continue in the background
//!          ▼
//! Ready { outcome }
//! ```

use crate::index::{DesignDocument, IndexKind};
use crate::ingest::error::{IngestError, IngestResult, SourceError};
use crate::ingest::parser::parse_post;
use crate::ingest::source::{PostRef, PostSource};
use crate::store::{BulkStatus, Document, DocumentStore, QueryOptions, Staleness};
use futures_util::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Counts from one installation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Posts found by the source
    pub discovered: usize,
    pub inserted: usize,
    /// Ids that were already in the store
    pub conflicts: usize,
    pub rejected: usize,
}

/// How an ingestion run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Installed(IngestSummary),
    AlreadyInstalled,
    Failed { error: String },
}

/// Signal that ingestion has finished and reads may begin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ready {
    pub outcome: IngestOutcome,
}

impl Ready {
    /// True if this run loaded posts into the store
    pub fn is_installed(&self) -> bool {
        matches!(self.outcome, IngestOutcome::Installed(_))
    }
}

/// The store already holds every discoverable post plus the design document
pub fn is_already_installed(doc_count: u64, discovered: usize) -> bool {
    doc_count as i64 - discovered as i64 == 1
}

/// Loads posts from a source into a store and installs the views
pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    source: Arc<dyn PostSource>,
    /// Held for the whole of an installation
    gate: Mutex<()>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn DocumentStore>, source: Arc<dyn PostSource>) -> Self {
        Self {
            store,
            source,
            gate: Mutex::new(()),
        }
    }

    /// Run the pipeline and report how it ended
    ///
    /// Never fails: errors are logged and carried in the outcome.
    pub async fn run(&self) -> Ready {
        let outcome = match self.install().await {
            Ok(summary) => {
                tracing::info!(
                    "Installed {} of {} posts from {} source",
                    summary.inserted,
                    summary.discovered,
                    self.source.name()
                );
                IngestOutcome::Installed(summary)
            }
            Err(IngestError::AlreadyInstalled) => {
                tracing::info!("Already installed. Skipping setup...");
                IngestOutcome::AlreadyInstalled
            }
            Err(e) => {
                tracing::error!("Ingestion failed: {}", e);
                IngestOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        Ready { outcome }
    }

    /// Run the pipeline, surfacing every failure
    pub async fn install(&self) -> IngestResult<IngestSummary> {
        let _guard = self.gate.lock().await;

        let info = self.store.info().await?;
        let posts = self.source.discover().await?;

        if is_already_installed(info.doc_count, posts.len()) {
            return Err(IngestError::AlreadyInstalled);
        }

        tracing::info!(
            "Discovered {} posts ({} documents in store)",
            posts.len(),
            info.doc_count
        );

        let docs = self.fetch_all(&posts).await?;

        let mut summary = IngestSummary {
            discovered: posts.len(),
            ..Default::default()
        };

        for result in self.store.bulk_insert(docs).await? {
            match result.status {
                BulkStatus::Created => summary.inserted += 1,
                BulkStatus::Conflict => {
                    tracing::warn!("Document {} already exists", result.id);
                    summary.conflicts += 1;
                }
                BulkStatus::Rejected(reason) => {
                    tracing::warn!("Document {} rejected: {}", result.id, reason);
                    summary.rejected += 1;
                }
            }
        }

        self.store.put_design(DesignDocument::standard()).await?;
        self.prime_indexes().await?;

        Ok(summary)
    }

    /// Fetch and parse every post concurrently
    async fn fetch_all(&self, posts: &[PostRef]) -> Result<Vec<Document>, SourceError> {
        let fetches = posts.iter().map(|post| {
            let source = Arc::clone(&self.source);
            async move {
                let raw = source.fetch(post).await?;
                Ok::<_, SourceError>(parse_post(&raw, post))
            }
        });

        try_join_all(fetches).await
    }

    /// Kick off a background build of every view
    async fn prime_indexes(&self) -> IngestResult<()> {
        let primes = IndexKind::every().iter().map(|view| {
            let store = Arc::clone(&self.store);
            async move {
                store
                    .query(*view, QueryOptions::new().stale(Staleness::UpdateAfter))
                    .await
            }
        });

        try_join_all(primes).await?;
        tracing::debug!("Primed {} views", IndexKind::every().len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::source::{DirectorySource, ManifestSource};
    use crate::store::{SqliteStore, StoreConfig};
    use std::path::Path;
    use tempfile::tempdir;

    fn write_posts(root: &Path) {
        let txt = root.join("txt");
        std::fs::create_dir_all(&txt).unwrap();
        std::fs::write(
            txt.join("first.md"),
            "datetime: 2020-01-01T09:00:00\ntags: a,b\n\nFirst post",
        )
        .unwrap();
        std::fs::write(
            txt.join("second.md"),
            "datetime: 2020-01-04T09:00:00\npeople: ada\n\nSecond post",
        )
        .unwrap();
        std::fs::write(txt.join("about.md"), "title: About\n\nAbout this zine").unwrap();
    }

    async fn setup() -> (Arc<SqliteStore>, Ingestor, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        write_posts(dir.path());

        let store = Arc::new(
            SqliteStore::open(StoreConfig::new(dir.path().join("data")))
                .await
                .unwrap(),
        );
        let source = Arc::new(DirectorySource::new(dir.path(), "txt"));
        let ingestor = Ingestor::new(store.clone(), source);
        (store, ingestor, dir)
    }

    #[test]
    fn test_already_installed_rule() {
        assert!(is_already_installed(4, 3));
        assert!(!is_already_installed(0, 3));
        assert!(!is_already_installed(3, 3));
        assert!(!is_already_installed(5, 3));
        assert!(is_already_installed(1, 0));
    }

    #[tokio::test]
    async fn test_install_then_skip() {
        let (store, ingestor, _dir) = setup().await;

        let ready = ingestor.run().await;
        assert_eq!(
            ready.outcome,
            IngestOutcome::Installed(IngestSummary {
                discovered: 3,
                inserted: 3,
                conflicts: 0,
                rejected: 0,
            })
        );
        assert_eq!(store.info().await.unwrap().doc_count, 4);

        let doc = store.get("first").await.unwrap();
        assert_eq!(doc.tags, vec!["a", "b"]);
        assert_eq!(doc.path.as_deref(), Some("txt/first.md"));

        let ready = ingestor.run().await;
        assert_eq!(ready.outcome, IngestOutcome::AlreadyInstalled);
        assert!(matches!(
            ingestor.install().await.unwrap_err(),
            IngestError::AlreadyInstalled
        ));
        assert_eq!(store.info().await.unwrap().doc_count, 4);
    }

    #[tokio::test]
    async fn test_reingest_never_duplicates() {
        let (store, ingestor, dir) = setup().await;
        ingestor.install().await.unwrap();

        // a new post changes the difference, so the pipeline runs again
        std::fs::write(
            dir.path().join("txt").join("third.md"),
            "datetime: 2020-02-01T00:00:00\n\nThird",
        )
        .unwrap();

        let summary = ingestor.install().await.unwrap();
        assert_eq!(summary.discovered, 4);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.conflicts, 3);
        assert_eq!(store.info().await.unwrap().doc_count, 5);
    }

    #[tokio::test]
    async fn test_fetch_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        write_posts(dir.path());
        std::fs::write(dir.path().join("list.txt"), "first.md\ngone.md\n").unwrap();

        let store = Arc::new(
            SqliteStore::open(StoreConfig::new(dir.path().join("data")))
                .await
                .unwrap(),
        );
        let source = Arc::new(ManifestSource::new(dir.path(), "txt", "list.txt"));
        let ingestor = Ingestor::new(store.clone(), source);

        let ready = ingestor.run().await;
        assert!(matches!(ready.outcome, IngestOutcome::Failed { .. }));
        assert!(!ready.is_installed());
        assert_eq!(store.info().await.unwrap().doc_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_runs_install_once() {
        let (store, ingestor, _dir) = setup().await;

        let (a, b) = tokio::join!(ingestor.run(), ingestor.run());
        let installed = [&a, &b].iter().filter(|r| r.is_installed()).count();
        assert_eq!(installed, 1);
        assert!(
            a.outcome == IngestOutcome::AlreadyInstalled
                || b.outcome == IngestOutcome::AlreadyInstalled
        );
        assert_eq!(store.info().await.unwrap().doc_count, 4);
    }

    #[tokio::test]
    async fn test_ready_json_shape() {
        let (_store, ingestor, _dir) = setup().await;

        let json = serde_json::to_value(ingestor.run().await).unwrap();
        assert_eq!(json["outcome"]["status"], "installed");
        assert_eq!(json["outcome"]["inserted"], 3);
        assert!(json["outcome"].get("outcome").is_none());

        let json = serde_json::to_value(ingestor.run().await).unwrap();
        assert_eq!(json, serde_json::json!({ "outcome": { "status": "already_installed" } }));
    }
}
