//! Archive Builder - sparse per-day counts into a gap-free calendar
//!
//! ```text
//! date view (grouped):  2020-01-01 → 2   2020-01-04 → 1
//! archive:              01-01:2  01-02:0  01-03:0  01-04:1
//! ```

use crate::store::Row;
use chrono::NaiveDate;
use serde::Serialize;

/// Posts published on one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub date: NaiveDate,
    /// Zero for days synthesized to fill a gap
    pub count: u64,
}

/// Build a contiguous day-by-day series from grouped `date` rows
///
/// Rows whose key is not a `%Y-%m-%d` date are skipped.
pub fn build_archive(rows: &[Row]) -> Vec<ArchiveEntry> {
    let mut days: Vec<ArchiveEntry> = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(key) = row.key_str() else {
            tracing::warn!("Skipping archive row with non-string key {}", row.key);
            continue;
        };
        let date = match NaiveDate::parse_from_str(key, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!("Skipping archive row {:?}: {}", key, e);
                continue;
            }
        };

        days.push(ArchiveEntry {
            date,
            count: row.count().unwrap_or(0),
        });
    }

    days.sort_by_key(|entry| entry.date);
    days.dedup_by(|next, kept| {
        if next.date == kept.date {
            kept.count += next.count;
            true
        } else {
            false
        }
    });

    let (Some(first), Some(last)) = (days.first(), days.last()) else {
        return Vec::new();
    };

    let mut archive = Vec::new();
    let mut sparse = days.iter().peekable();

    for date in first.date.iter_days().take_while(|d| *d <= last.date) {
        match sparse.peek() {
            Some(entry) if entry.date == date => {
                archive.push(**entry);
                sparse.next();
            }
            _ => archive.push(ArchiveEntry { date, count: 0 }),
        }
    }

    archive
}
