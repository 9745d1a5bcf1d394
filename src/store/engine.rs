//! Zine Document Store
//!
//! The SQLite-backed store orchestrates:
//! - Write path: Document → JSON body → `documents` table (monotonic seq)
//! - Design path: DesignDocument → `documents` table + IndexManager install
//! - Read path: Query → design check → refresh (per staleness) → rows → docs
//!
//! Connections sit behind `std::sync::Mutex` and are never held across an
//! await. Every read, write and view build runs on the blocking pool.

use crate::index::{DesignDocument, IndexKind, IndexManager, IndexStats, DESIGN_ID};
use crate::store::error::{StoreError, StoreResult};
use crate::store::types::{
    BulkResult, BulkStatus, Document, QueryOptions, Row, Staleness, StoreInfo,
};
use crate::store::DocumentStore;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Configuration for the document store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory for all data
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("zine_data"),
        }
    }
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Get path to the documents database
    pub fn documents_path(&self) -> PathBuf {
        self.data_dir.join("documents.db")
    }
}

/// State shared with the blocking pool
struct Shared {
    /// Documents and design documents
    docs: Mutex<Connection>,
    /// Views (std::sync::Mutex because rusqlite::Connection is !Sync)
    index: Mutex<IndexManager>,
}

impl Shared {
    fn docs(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.docs
            .lock()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire documents lock: {}", e)))
    }

    fn index(&self) -> StoreResult<MutexGuard<'_, IndexManager>> {
        self.index
            .lock()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire index lock: {}", e)))
    }

    fn read_info(&self) -> StoreResult<StoreInfo> {
        let conn = self.docs()?;
        let (doc_count, update_seq): (i64, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MAX(seq) FROM documents",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StoreInfo {
            doc_count: doc_count as u64,
            update_seq: update_seq.unwrap_or(0),
        })
    }

    fn get_doc(&self, id: &str) -> StoreResult<Document> {
        let conn = self.docs()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(serde_json::from_str(&body)?),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    fn insert_docs(&self, docs: &[Document]) -> StoreResult<Vec<BulkResult>> {
        let mut conn = self.docs()?;
        let tx = conn.transaction()?;
        let mut results = Vec::with_capacity(docs.len());

        {
            let mut insert =
                tx.prepare_cached("INSERT OR IGNORE INTO documents (id, body) VALUES (?, ?)")?;

            for doc in docs {
                let status = if doc.id.is_empty() {
                    BulkStatus::Rejected("empty id".to_string())
                } else if Document::is_design_id(&doc.id) {
                    BulkStatus::Rejected("reserved id".to_string())
                } else {
                    let body = serde_json::to_string(doc)?;
                    match insert.execute(params![doc.id, body])? {
                        0 => BulkStatus::Conflict,
                        _ => BulkStatus::Created,
                    }
                };

                results.push(BulkResult {
                    id: doc.id.clone(),
                    status,
                });
            }
        }

        tx.commit()?;
        Ok(results)
    }

    fn store_design(&self, design: DesignDocument) -> StoreResult<()> {
        let body = serde_json::to_string(&design)?;

        {
            let conn = self.docs()?;
            conn.execute(
                "INSERT INTO documents (id, body) VALUES (?, ?)
                 ON CONFLICT(id) DO UPDATE SET body = excluded.body",
                params![design.id, body],
            )?;
        }

        self.index()?.install(design)
    }

    /// Bring one view up to the latest document sequence
    ///
    /// Lock order is index, then documents.
    fn refresh_view(&self, view: IndexKind) -> StoreResult<usize> {
        let mut index = self.index()?;
        let since = index.indexed_seq(view)?;

        let (docs, last_seq) = {
            let conn = self.docs()?;
            read_changes(&conn, since)?
        };

        if last_seq <= since {
            return Ok(0);
        }

        index.index_documents(view, &docs, last_seq)?;
        Ok(docs.len())
    }

    /// Design check, build if `Update`, then read and attach documents
    fn read_view(&self, view: IndexKind, options: &QueryOptions) -> StoreResult<Vec<Row>> {
        self.index()?.ensure_installed(view)?;

        if options.stale == Staleness::Update {
            self.refresh_view(view)?;
        }

        let mut rows = self.read_rows(view, options)?;
        if options.include_docs {
            self.attach_docs(&mut rows)?;
        }

        Ok(rows)
    }

    /// Read rows from the materialized view
    fn read_rows(&self, view: IndexKind, options: &QueryOptions) -> StoreResult<Vec<Row>> {
        let reduce = view.reduce().is_some() && options.reduce.unwrap_or(true);
        let index = self.index()?;

        if reduce {
            let keys = options.keys.as_deref();
            let groups = index.count_by_key(view, keys)?;

            if options.group {
                return Ok(groups
                    .into_iter()
                    .map(|(key, count)| Row::reduced(Value::String(key), count))
                    .collect());
            }

            let total: u64 = groups.iter().map(|(_, count)| count).sum();
            if total == 0 {
                return Ok(Vec::new());
            }
            return Ok(vec![Row::reduced(Value::Null, total)]);
        }

        let pairs = match &options.keys {
            Some(keys) => index.find_keys(view, keys)?,
            None => index.find_all(view)?,
        };

        Ok(pairs
            .into_iter()
            .map(|(key, doc_id)| Row::mapped(key, doc_id))
            .collect())
    }

    /// Attach documents to mapped rows
    fn attach_docs(&self, rows: &mut [Row]) -> StoreResult<()> {
        let conn = self.docs()?;
        let mut stmt = conn.prepare_cached("SELECT body FROM documents WHERE id = ?")?;

        for row in rows.iter_mut() {
            let Some(id) = row.id.as_deref() else {
                continue;
            };
            let body: Option<String> = stmt.query_row(params![id], |r| r.get(0)).optional()?;
            row.doc = match body {
                Some(body) => Some(serde_json::from_str(&body)?),
                None => None,
            };
        }

        Ok(())
    }
}

/// Document store on SQLite with incremental map/reduce views
pub struct SqliteStore {
    config: StoreConfig,
    shared: Arc<Shared>,
}

impl SqliteStore {
    /// Open (or create) a store
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let conn = Connection::open(config.documents_path())?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                body TEXT NOT NULL
            )",
            [],
        )?;

        let mut index = IndexManager::new(&config.data_dir)?;
        if let Some(design) = load_design(&conn)? {
            index.load(design)?;
        }

        let shared = Arc::new(Shared {
            docs: Mutex::new(conn),
            index: Mutex::new(index),
        });

        let info = shared.read_info()?;
        tracing::info!(
            "Opened store at {:?} ({} documents, seq {})",
            config.data_dir,
            info.doc_count,
            info.update_seq
        );

        Ok(Self { config, shared })
    }

    /// Run SQLite work on the blocking pool and wait for it
    ///
    /// Lock waits and queries never stall the async worker threads.
    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Shared) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || f(&shared)).await?
    }

    /// Build a view on the blocking pool without waiting
    fn refresh_in_background(&self, view: IndexKind) {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || match shared.refresh_view(view) {
            Ok(n) => tracing::debug!("Background build of {} mapped {} documents", view, n),
            Err(e) => tracing::error!("Background build of {} failed: {}", view, e),
        });
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get statistics about the installed views
    pub async fn index_stats(&self) -> StoreResult<IndexStats> {
        self.blocking(|shared| Ok(shared.index()?.stats())).await
    }

    /// Flush view storage to disk
    pub async fn shutdown(&self) -> StoreResult<()> {
        self.blocking(|shared| shared.index()?.persist()).await
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn info(&self) -> StoreResult<StoreInfo> {
        self.blocking(|shared| shared.read_info()).await
    }

    async fn get(&self, id: &str) -> StoreResult<Document> {
        if Document::is_design_id(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let id = id.to_string();
        self.blocking(move |shared| shared.get_doc(&id)).await
    }

    async fn bulk_insert(&self, docs: Vec<Document>) -> StoreResult<Vec<BulkResult>> {
        let total = docs.len();
        let results = self.blocking(move |shared| shared.insert_docs(&docs)).await?;

        let created = results.iter().filter(|r| r.is_ok()).count();
        tracing::debug!("Bulk insert: {} of {} documents created", created, total);
        Ok(results)
    }

    async fn put_design(&self, design: DesignDocument) -> StoreResult<()> {
        self.blocking(move |shared| shared.store_design(design)).await
    }

    async fn query(&self, view: IndexKind, options: QueryOptions) -> StoreResult<Vec<Row>> {
        let reduce = view.reduce().is_some() && options.reduce.unwrap_or(true);
        if reduce && options.include_docs {
            return Err(StoreError::InvalidQuery(format!(
                "include_docs is invalid for reduce on {}",
                view
            )));
        }

        let stale = options.stale;
        let rows = self
            .blocking(move |shared| shared.read_view(view, &options))
            .await?;

        if stale == Staleness::UpdateAfter {
            self.refresh_in_background(view);
        }

        Ok(rows)
    }
}

/// Documents written after `since`, and the latest sequence seen
fn read_changes(conn: &Connection, since: i64) -> StoreResult<(Vec<Document>, i64)> {
    let mut stmt =
        conn.prepare_cached("SELECT seq, id, body FROM documents WHERE seq > ? ORDER BY seq")?;
    let rows = stmt
        .query_map(params![since], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut last_seq = since;
    let mut docs = Vec::with_capacity(rows.len());
    for (seq, id, body) in rows {
        last_seq = last_seq.max(seq);
        if Document::is_design_id(&id) {
            continue;
        }
        docs.push(serde_json::from_str(&body)?);
    }

    Ok((docs, last_seq))
}

fn load_design(conn: &Connection) -> StoreResult<Option<DesignDocument>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE id = ?",
            params![DESIGN_ID],
            |row| row.get(0),
        )
        .optional()?;

    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}
