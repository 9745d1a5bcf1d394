//! Reader - the read operations exposed to presentation
//!
//! Every read is a single view query or point lookup wrapped in the retry
//! policy, because the views may not be installed or built yet while
//! ingestion is still running.
//!
//! | Operation     | Store call                                   | Retried on              |
//! |---------------|----------------------------------------------|-------------------------|
//! | `get_posts`   | `query(all / filter view, include_docs)`     | IndexMissing            |
//! | `get_about`   | `get("about")`                               | NotFound, IndexMissing  |
//! | `get_archive` | `query(date, group)` then `build_archive`    | IndexMissing            |
//!
//! The `get_*` variants log failures and yield `None` so the caller can keep
//! whatever it showed before.

use crate::index::IndexKind;
use crate::query::archive::{build_archive, ArchiveEntry};
use crate::query::error::QueryResult;
use crate::query::retry::{Attempt, RetryPolicy};
use crate::store::{Document, DocumentStore, QueryOptions, StoreError};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Id of the about page
pub const ABOUT_ID: &str = "about";

/// Which index a filter reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Tag,
    Date,
    Text,
    Person,
}

impl FilterKind {
    /// Parameter resolution order
    pub const PRIORITY: [FilterKind; 4] = [
        FilterKind::Tag,
        FilterKind::Date,
        FilterKind::Text,
        FilterKind::Person,
    ];

    pub fn index(&self) -> IndexKind {
        match self {
            FilterKind::Tag => IndexKind::Tag,
            FilterKind::Date => IndexKind::Date,
            FilterKind::Text => IndexKind::Text,
            FilterKind::Person => IndexKind::Person,
        }
    }

    pub fn param(&self) -> &'static str {
        self.index().name()
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.param())
    }
}

impl FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKind::PRIORITY
            .iter()
            .copied()
            .find(|kind| kind.param() == s)
            .ok_or_else(|| format!("unknown filter: {}", s))
    }
}

/// A filter over one index with one or more keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFilter {
    pub kind: FilterKind,
    pub keys: Vec<String>,
}

impl PostFilter {
    /// Build a filter from comma-separated keys
    ///
    /// Keys are trimmed and empty ones dropped; no keys left means no filter.
    pub fn new(kind: FilterKind, keys: &str) -> Option<Self> {
        let keys: Vec<String> = keys
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect();

        if keys.is_empty() {
            None
        } else {
            Some(Self { kind, keys })
        }
    }

    /// Pick the first present parameter in `tag`, `date`, `text`, `person` order
    pub fn from_params(params: &HashMap<String, String>) -> Option<Self> {
        FilterKind::PRIORITY.iter().find_map(|kind| {
            params
                .get(kind.param())
                .and_then(|value| PostFilter::new(*kind, value))
        })
    }

    fn options(&self) -> QueryOptions {
        QueryOptions::new()
            .keys(self.keys.iter().cloned())
            .include_docs(true)
            .reduce(false)
    }
}

/// Read side over a document store
pub struct Reader {
    store: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
}

impl Reader {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
        }
    }

    /// Builder method: set the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Posts matching the filter, or every dated post in chronological order
    ///
    /// One document per emitted row, in row order.
    pub async fn query_posts(&self, filter: Option<&PostFilter>) -> QueryResult<Vec<Document>> {
        let (view, options) = match filter {
            Some(filter) => (filter.kind.index(), filter.options()),
            None => (IndexKind::All, QueryOptions::new().include_docs(true)),
        };

        let rows = self
            .policy
            .run("get_posts", || {
                let store = Arc::clone(&self.store);
                let options = options.clone();
                async move { Attempt::from_result(store.query(view, options).await) }
            })
            .await?;

        Ok(rows.into_iter().filter_map(|row| row.doc).collect())
    }

    pub async fn get_posts(&self, filter: Option<&PostFilter>) -> Option<Vec<Document>> {
        match self.query_posts(filter).await {
            Ok(posts) => Some(posts),
            Err(e) => {
                tracing::error!("Failed to load posts: {}", e);
                None
            }
        }
    }

    /// The about page, waiting for it to be loaded
    pub async fn fetch_about(&self) -> QueryResult<Document> {
        self.policy
            .run("get_about", || {
                let store = Arc::clone(&self.store);
                async move {
                    Attempt::classify(store.get(ABOUT_ID).await, |e: &StoreError| {
                        e.is_not_found() || e.is_index_missing()
                    })
                }
            })
            .await
    }

    pub async fn get_about(&self) -> Option<Document> {
        match self.fetch_about().await {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::error!("Failed to load about page: {}", e);
                None
            }
        }
    }

    /// Day-by-day post counts from the first to the last post
    pub async fn fetch_archive(&self) -> QueryResult<Vec<ArchiveEntry>> {
        let rows = self
            .policy
            .run("get_archive", || {
                let store = Arc::clone(&self.store);
                async move {
                    Attempt::from_result(
                        store
                            .query(IndexKind::Date, QueryOptions::new().group(true))
                            .await,
                    )
                }
            })
            .await?;

        Ok(build_archive(&rows))
    }

    pub async fn get_archive(&self) -> Option<Vec<ArchiveEntry>> {
        match self.fetch_archive().await {
            Ok(archive) => Some(archive),
            Err(e) => {
                tracing::error!("Failed to load archive: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DesignDocument;
    use crate::ingest::{DirectorySource, Ingestor};
    use crate::store::{
        BulkResult, Row, SqliteStore, StoreConfig, StoreInfo, StoreResult,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(20),
        }
    }

    /// Reports the views missing for the first `failures` queries
    struct FlakyStore {
        inner: SqliteStore,
        failures: u32,
        queries: AtomicU32,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn info(&self) -> StoreResult<StoreInfo> {
            self.inner.info().await
        }

        async fn get(&self, id: &str) -> StoreResult<Document> {
            self.inner.get(id).await
        }

        async fn bulk_insert(&self, docs: Vec<Document>) -> StoreResult<Vec<BulkResult>> {
            self.inner.bulk_insert(docs).await
        }

        async fn put_design(&self, design: DesignDocument) -> StoreResult<()> {
            self.inner.put_design(design).await
        }

        async fn query(&self, view: IndexKind, options: QueryOptions) -> StoreResult<Vec<Row>> {
            if self.queries.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(StoreError::IndexMissing(view.name().to_string()));
            }
            self.inner.query(view, options).await
        }
    }

    fn post(id: &str, datetime: &str) -> Document {
        Document::new(id)
            .path(format!("txt/{}.md", id))
            .datetime(datetime)
            .text(format!("text of {}", id))
    }

    async fn populated_store(dir: &std::path::Path) -> SqliteStore {
        let store = SqliteStore::open(StoreConfig::new(dir)).await.unwrap();
        store
            .bulk_insert(vec![
                post("late", "2020-01-04T10:00:00").tag("rust"),
                post("early", "2020-01-01T08:00:00").tag("db").person("ada"),
                post("middle", "2020-01-01T20:00:00")
                    .tag("rust")
                    .tag("db"),
                Document::new("about").path("txt/about.md").text("About page"),
            ])
            .await
            .unwrap();
        store.put_design(DesignDocument::standard()).await.unwrap();
        store
    }

    fn ids(posts: &[Document]) -> Vec<&str> {
        posts.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_filter_keys() {
        let filter = PostFilter::new(FilterKind::Tag, " rust, ,db ").unwrap();
        assert_eq!(filter.keys, vec!["rust", "db"]);
        assert!(PostFilter::new(FilterKind::Tag, " , ").is_none());
    }

    #[test]
    fn test_filter_from_params_priority() {
        let mut params = HashMap::new();
        params.insert("person".to_string(), "ada".to_string());
        params.insert("date".to_string(), "2020-01-01".to_string());
        params.insert("unrelated".to_string(), "x".to_string());

        let filter = PostFilter::from_params(&params).unwrap();
        assert_eq!(filter.kind, FilterKind::Date);

        params.insert("tag".to_string(), "".to_string());
        let filter = PostFilter::from_params(&params).unwrap();
        assert_eq!(filter.kind, FilterKind::Date);

        assert!(PostFilter::from_params(&HashMap::new()).is_none());
        assert_eq!("text".parse::<FilterKind>().unwrap(), FilterKind::Text);
    }

    #[tokio::test]
    async fn test_unfiltered_posts_are_chronological() {
        let dir = tempdir().unwrap();
        let reader = Reader::new(Arc::new(populated_store(dir.path()).await));

        let posts = reader.get_posts(None).await.unwrap();
        assert_eq!(ids(&posts), vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn test_filtered_posts_follow_key_order() {
        let dir = tempdir().unwrap();
        let reader = Reader::new(Arc::new(populated_store(dir.path()).await));

        let filter = PostFilter::new(FilterKind::Tag, "rust,db").unwrap();
        let posts = reader.get_posts(Some(&filter)).await.unwrap();
        assert_eq!(ids(&posts), vec!["late", "middle", "early", "middle"]);

        let filter = PostFilter::new(FilterKind::Date, "2020-01-01").unwrap();
        let posts = reader.get_posts(Some(&filter)).await.unwrap();
        assert_eq!(ids(&posts), vec!["early", "middle"]);

        let filter = PostFilter::new(FilterKind::Person, "nobody").unwrap();
        assert!(reader.get_posts(Some(&filter)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_text_filter_emits_per_token() {
        let dir = tempdir().unwrap();
        let reader = Reader::new(Arc::new(populated_store(dir.path()).await));

        let filter = PostFilter::new(FilterKind::Text, "text").unwrap();
        let posts = reader.get_posts(Some(&filter)).await.unwrap();
        assert_eq!(ids(&posts), vec!["early", "late", "middle"]);
    }

    #[tokio::test]
    async fn test_retries_until_index_available() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FlakyStore {
            inner: populated_store(dir.path()).await,
            failures: 3,
            queries: AtomicU32::new(0),
        });
        let reader = Reader::new(store.clone()).with_policy(fast(5));

        let posts = reader.query_posts(None).await.unwrap();
        assert_eq!(posts.len(), 3);
        assert_eq!(store.queries.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retries_exhausted_yields_none() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FlakyStore {
            inner: populated_store(dir.path()).await,
            failures: 10,
            queries: AtomicU32::new(0),
        });
        let reader = Reader::new(store).with_policy(fast(3));

        assert!(reader.get_posts(None).await.is_none());
        assert!(reader.get_archive().await.is_none());
    }

    #[tokio::test]
    async fn test_archive() {
        let dir = tempdir().unwrap();
        let reader = Reader::new(Arc::new(populated_store(dir.path()).await));

        let archive = reader.get_archive().await.unwrap();
        let counts: Vec<u64> = archive.iter().map(|e| e.count).collect();
        assert_eq!(counts, vec![2, 0, 0, 1]);
    }

    #[tokio::test]
    async fn test_empty_store_archive() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(StoreConfig::new(dir.path())).await.unwrap();
        store.put_design(DesignDocument::standard()).await.unwrap();

        let reader = Reader::new(Arc::new(store));
        assert_eq!(reader.get_archive().await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_about() {
        let dir = tempdir().unwrap();
        let reader = Reader::new(Arc::new(populated_store(dir.path()).await));

        let about = reader.get_about().await.unwrap();
        assert_eq!(about.text.as_deref(), Some("About page"));
    }

    #[tokio::test]
    async fn test_about_missing_gives_up() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(StoreConfig::new(dir.path())).await.unwrap();
        let reader = Reader::new(Arc::new(store)).with_policy(fast(2));

        assert!(reader.get_about().await.is_none());
    }

    #[tokio::test]
    async fn test_reads_race_ingestion() {
        let dir = tempdir().unwrap();
        let txt = dir.path().join("txt");
        std::fs::create_dir_all(&txt).unwrap();
        std::fs::write(txt.join("one.md"), "datetime: 2020-01-01T00:00:00\n\nOne").unwrap();
        std::fs::write(txt.join("two.md"), "datetime: 2020-01-02T00:00:00\n\nTwo").unwrap();
        std::fs::write(txt.join("about.md"), "About").unwrap();

        let store = Arc::new(
            SqliteStore::open(StoreConfig::new(dir.path().join("data")))
                .await
                .unwrap(),
        );
        let ingestor = Ingestor::new(store.clone(), Arc::new(DirectorySource::new(dir.path(), "txt")));
        let reader = Reader::new(store).with_policy(fast(200));

        let (ready, posts, about) =
            tokio::join!(ingestor.run(), reader.get_posts(None), reader.get_about());

        assert!(ready.is_installed());
        assert_eq!(ids(&posts.unwrap()), vec!["one", "two"]);
        assert_eq!(about.unwrap().text.as_deref(), Some("About"));
    }
}
