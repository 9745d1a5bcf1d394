//! Index Manager - Coordinates the installed design and its views
//!
//! Provides a unified interface to:
//! - the installed `DesignDocument` (which views exist)
//! - the `ViewIndex` (materialized rows and per-view build progress)
//!
//! # Refresh
//!
//! ```text
//! Query: "posts tagged rust"
//!
//! 1. Design check: is `tag` installed?       no  → IndexMissing
//! 2. Progress:     tag built up to seq 40
//! 3. Changes:      documents with seq > 40   → map each one
//! 4. Apply:        replace their rows, advance tag to the latest seq
//! 5. Read:         rows for key "rust"
//! ```

use crate::index::{DesignDocument, IndexEntry, IndexKind, IndexStats, ViewIndex, ViewStats};
use crate::store::{Document, StoreError};
use std::path::Path;

/// Coordinates the design document and the materialized views
pub struct IndexManager {
    /// Materialized rows
    views: ViewIndex,
    /// Currently installed design, if any
    design: Option<DesignDocument>,
}

impl IndexManager {
    /// Open the view storage under `data_dir/index`
    pub fn new(data_dir: &Path) -> Result<Self, StoreError> {
        let index_dir = data_dir.join("index");
        std::fs::create_dir_all(&index_dir)?;

        Ok(Self {
            views: ViewIndex::new(&index_dir)?,
            design: None,
        })
    }

    /// Adopt a design found on disk, keeping views that were already built
    pub fn load(&mut self, design: DesignDocument) -> Result<(), StoreError> {
        for view in &design.views {
            if self.views.indexed_seq(*view)?.is_none() {
                self.views.reset(*view)?;
            }
        }

        tracing::debug!("Loaded design {} with {} views", design.id, design.views.len());
        self.design = Some(design);
        Ok(())
    }

    /// Install (or overwrite) the design; every declared view starts empty
    pub fn install(&mut self, design: DesignDocument) -> Result<(), StoreError> {
        if let Some(previous) = &self.design {
            for view in previous.views.iter().filter(|v| !design.has_view(**v)) {
                self.views.remove(*view)?;
            }
        }

        for view in &design.views {
            self.views.reset(*view)?;
        }

        tracing::info!("Installed design {} with {} views", design.id, design.views.len());
        self.design = Some(design);
        Ok(())
    }

    /// Fail with `IndexMissing` unless the view is declared by the design
    pub fn ensure_installed(&self, view: IndexKind) -> Result<(), StoreError> {
        match &self.design {
            Some(design) if design.has_view(view) => Ok(()),
            _ => Err(StoreError::IndexMissing(view.name().to_string())),
        }
    }

    /// Sequence the view is built up to
    pub fn indexed_seq(&self, view: IndexKind) -> Result<i64, StoreError> {
        self.ensure_installed(view)?;
        Ok(self.views.indexed_seq(view)?.unwrap_or(0))
    }

    /// Map changed documents into the view and advance it to `seq`
    pub fn index_documents(
        &mut self,
        view: IndexKind,
        docs: &[Document],
        seq: i64,
    ) -> Result<usize, StoreError> {
        self.ensure_installed(view)?;

        let entries: Vec<(String, Vec<IndexEntry>)> = docs
            .iter()
            .map(|doc| (doc.id.clone(), view.map(doc)))
            .collect();
        let emitted: usize = entries.iter().map(|(_, e)| e.len()).sum();

        self.views.apply(view, &entries, seq)?;

        tracing::debug!(
            "Indexed {} documents into {} ({} rows), now at seq {}",
            docs.len(),
            view,
            emitted,
            seq
        );
        Ok(emitted)
    }

    /// All rows of a view in key order
    pub fn find_all(&self, view: IndexKind) -> Result<Vec<(String, String)>, StoreError> {
        self.ensure_installed(view)?;
        self.views.rows(view)
    }

    /// Rows for each key, in the order the keys are given
    pub fn find_keys(
        &self,
        view: IndexKind,
        keys: &[String],
    ) -> Result<Vec<(String, String)>, StoreError> {
        self.ensure_installed(view)?;

        let mut rows = Vec::new();
        for key in keys {
            rows.extend(self.views.rows_for_key(view, key)?);
        }
        Ok(rows)
    }

    /// Row counts grouped by key, optionally restricted to `keys`
    ///
    /// Keys with no rows are left out.
    pub fn count_by_key(
        &self,
        view: IndexKind,
        keys: Option<&[String]>,
    ) -> Result<Vec<(String, u64)>, StoreError> {
        self.ensure_installed(view)?;

        match keys {
            None => self.views.grouped_counts(view),
            Some(keys) => {
                let mut groups = Vec::with_capacity(keys.len());
                for key in keys {
                    let count = self.views.count_for_key(view, key)?;
                    if count > 0 {
                        groups.push((key.clone(), count));
                    }
                }
                Ok(groups)
            }
        }
    }

    /// Persist view storage
    pub fn persist(&mut self) -> Result<(), StoreError> {
        self.views.checkpoint()
    }

    /// Get statistics about every installed view
    pub fn stats(&self) -> IndexStats {
        let views = self
            .design
            .iter()
            .flat_map(|d| d.views.iter())
            .map(|view| ViewStats {
                view: *view,
                indexed_seq: self.views.indexed_seq(*view).ok().flatten().unwrap_or(0),
                rows: self.views.count(*view),
            })
            .collect();

        IndexStats {
            design_installed: self.design.is_some(),
            views,
        }
    }
}
