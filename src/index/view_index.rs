//! View Index - SQLite-backed B-tree holding materialized view rows
//!
//! Every emitted key is stored as one row `(view, key, doc_id, emit_idx)`.
//! Each view remembers the store sequence it has been built up to, so a
//! refresh only maps documents written after that point.
//!
//! # Performance
//! - Apply: O(log n) per emitted key, one transaction per refresh
//! - Key lookup: O(log n + k) where k = rows for that key
//! - Grouped count: one index scan over the view

use crate::index::{IndexEntry, IndexKind};
use crate::store::StoreError;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;

/// Materialized rows of every installed view
pub struct ViewIndex {
    conn: Connection,
}

impl ViewIndex {
    /// Create or open a view index
    pub fn new(index_dir: &Path) -> Result<Self, StoreError> {
        let path = index_dir.join("views.db");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = 10000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS view_entries (
                view TEXT NOT NULL,
                key TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                emit_idx INTEGER NOT NULL,
                PRIMARY KEY (view, doc_id, emit_idx)
            )",
            [],
        )?;

        // Key order within a view, ties broken by document then emission
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_view_key
             ON view_entries(view, key, doc_id, emit_idx)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS view_state (
                view TEXT PRIMARY KEY,
                indexed_seq INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(Self { conn })
    }

    /// Sequence the view is built up to, `None` if the view was never registered
    pub fn indexed_seq(&self, view: IndexKind) -> Result<Option<i64>, StoreError> {
        let seq = self
            .conn
            .query_row(
                "SELECT indexed_seq FROM view_state WHERE view = ?",
                params![view.name()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(seq)
    }

    /// Register a view with no rows, discarding anything built before
    pub fn reset(&mut self, view: IndexKind) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM view_entries WHERE view = ?",
            params![view.name()],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO view_state (view, indexed_seq) VALUES (?, 0)",
            params![view.name()],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// Forget a view entirely
    pub fn remove(&mut self, view: IndexKind) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM view_entries WHERE view = ?",
            params![view.name()],
        )?;
        tx.execute("DELETE FROM view_state WHERE view = ?", params![view.name()])?;
        tx.commit()?;

        Ok(())
    }

    /// Replace the rows of the given documents and advance the view to `seq`
    ///
    /// `entries` holds, per document id, everything its map emitted.
    pub fn apply(
        &mut self,
        view: IndexKind,
        entries: &[(String, Vec<IndexEntry>)],
        seq: i64,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        {
            let mut delete = tx.prepare_cached(
                "DELETE FROM view_entries WHERE view = ? AND doc_id = ?",
            )?;
            let mut insert = tx.prepare_cached(
                "INSERT INTO view_entries (view, key, doc_id, emit_idx) VALUES (?, ?, ?, ?)",
            )?;

            for (doc_id, emitted) in entries {
                delete.execute(params![view.name(), doc_id])?;
                for (idx, entry) in emitted.iter().enumerate() {
                    insert.execute(params![view.name(), entry.key, entry.doc_id, idx as i64])?;
                }
            }
        }

        tx.execute(
            "UPDATE view_state SET indexed_seq = ? WHERE view = ?",
            params![seq, view.name()],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// All rows of a view in key order as `(key, doc_id)`
    pub fn rows(&self, view: IndexKind) -> Result<Vec<(String, String)>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT key, doc_id FROM view_entries
             WHERE view = ?
             ORDER BY key, doc_id, emit_idx",
        )?;

        let rows = stmt
            .query_map(params![view.name()], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Rows for one key as `(key, doc_id)`
    pub fn rows_for_key(
        &self,
        view: IndexKind,
        key: &str,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT key, doc_id FROM view_entries
             WHERE view = ? AND key = ?
             ORDER BY doc_id, emit_idx",
        )?;

        let rows = stmt
            .query_map(params![view.name(), key], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Row count per key, in key order
    pub fn grouped_counts(&self, view: IndexKind) -> Result<Vec<(String, u64)>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT key, COUNT(*) FROM view_entries
             WHERE view = ?
             GROUP BY key
             ORDER BY key",
        )?;

        let rows = stmt
            .query_map(params![view.name()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Row count for one key
    pub fn count_for_key(&self, view: IndexKind, key: &str) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM view_entries WHERE view = ? AND key = ?",
            params![view.name(), key],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    /// Total rows in a view
    pub fn count(&self, view: IndexKind) -> u64 {
        let result: Result<i64, _> = self.conn.query_row(
            "SELECT COUNT(*) FROM view_entries WHERE view = ?",
            params![view.name()],
            |row| row.get(0),
        );

        result.unwrap_or(0) as u64
    }

    /// Force checkpoint for WAL mode
    pub fn checkpoint(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entries(doc_id: &str, keys: &[&str]) -> (String, Vec<IndexEntry>) {
        (
            doc_id.to_string(),
            keys.iter()
                .map(|k| IndexEntry {
                    key: k.to_string(),
                    doc_id: doc_id.to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_view_index_creation() {
        let dir = tempdir().unwrap();
        let index = ViewIndex::new(dir.path()).unwrap();
        assert_eq!(index.count(IndexKind::Tag), 0);
        assert_eq!(index.indexed_seq(IndexKind::Tag).unwrap(), None);
    }

    #[test]
    fn test_apply_and_read_in_key_order() {
        let dir = tempdir().unwrap();
        let mut index = ViewIndex::new(dir.path()).unwrap();
        index.reset(IndexKind::Tag).unwrap();

        index
            .apply(
                IndexKind::Tag,
                &[entries("p2", &["rust", "db"]), entries("p1", &["rust"])],
                7,
            )
            .unwrap();

        assert_eq!(index.indexed_seq(IndexKind::Tag).unwrap(), Some(7));
        assert_eq!(index.count(IndexKind::Tag), 3);

        let rows = index.rows(IndexKind::Tag).unwrap();
        let keys: Vec<(&str, &str)> = rows.iter().map(|(k, d)| (k.as_str(), d.as_str())).collect();
        assert_eq!(keys, vec![("db", "p2"), ("rust", "p1"), ("rust", "p2")]);

        let rust = index.rows_for_key(IndexKind::Tag, "rust").unwrap();
        assert_eq!(rust.len(), 2);
        assert_eq!(index.count_for_key(IndexKind::Tag, "db").unwrap(), 1);
    }

    #[test]
    fn test_reapply_replaces_document_rows() {
        let dir = tempdir().unwrap();
        let mut index = ViewIndex::new(dir.path()).unwrap();
        index.reset(IndexKind::Person).unwrap();

        index
            .apply(IndexKind::Person, &[entries("p1", &["ada", "grace"])], 1)
            .unwrap();
        index
            .apply(IndexKind::Person, &[entries("p1", &["linus"])], 2)
            .unwrap();

        let rows = index.rows(IndexKind::Person).unwrap();
        assert_eq!(rows, vec![("linus".to_string(), "p1".to_string())]);
    }

    #[test]
    fn test_grouped_counts() {
        let dir = tempdir().unwrap();
        let mut index = ViewIndex::new(dir.path()).unwrap();
        index.reset(IndexKind::Date).unwrap();

        index
            .apply(
                IndexKind::Date,
                &[
                    entries("a", &["2020-01-02"]),
                    entries("b", &["2020-01-03"]),
                    entries("c", &["2020-01-02"]),
                ],
                3,
            )
            .unwrap();

        let groups = index.grouped_counts(IndexKind::Date).unwrap();
        assert_eq!(
            groups,
            vec![("2020-01-02".to_string(), 2), ("2020-01-03".to_string(), 1)]
        );
    }

    #[test]
    fn test_views_are_isolated() {
        let dir = tempdir().unwrap();
        let mut index = ViewIndex::new(dir.path()).unwrap();
        index.reset(IndexKind::Tag).unwrap();
        index.reset(IndexKind::Person).unwrap();

        index.apply(IndexKind::Tag, &[entries("p1", &["x"])], 1).unwrap();
        index.apply(IndexKind::Person, &[entries("p1", &["x"])], 1).unwrap();

        index.reset(IndexKind::Tag).unwrap();
        assert_eq!(index.count(IndexKind::Tag), 0);
        assert_eq!(index.count(IndexKind::Person), 1);

        index.remove(IndexKind::Person).unwrap();
        assert_eq!(index.indexed_seq(IndexKind::Person).unwrap(), None);
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();

        {
            let mut index = ViewIndex::new(dir.path()).unwrap();
            index.reset(IndexKind::Text).unwrap();
            index
                .apply(IndexKind::Text, &[entries("p1", &["hello", "world"])], 4)
                .unwrap();
        }

        {
            let index = ViewIndex::new(dir.path()).unwrap();
            assert_eq!(index.indexed_seq(IndexKind::Text).unwrap(), Some(4));
            assert_eq!(index.count(IndexKind::Text), 2);
        }
    }
}
