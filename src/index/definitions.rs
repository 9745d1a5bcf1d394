//! Index Definitions - the five map/reduce views over posts
//!
//! Each view is described by data: a name, a map function that is a pure
//! function of one document, and an optional reduce.
//!
//! | View   | Emits                                    | Reduce |
//! |--------|------------------------------------------|--------|
//! | all    | `datetime`, if `path` and `datetime` set | -      |
//! | tag    | each tag                                 | -      |
//! | date   | date portion of `datetime`               | count  |
//! | text   | each `[\w-]+` token of the body          | -      |
//! | person | each person                              | -      |

use crate::store::Document;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Id of the design document that installs the views
pub const DESIGN_ID: &str = "_design/index";

/// Key/value pair emitted by a map function against one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: String,
    pub doc_id: String,
}

/// Reduce step applied to the rows of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduce {
    /// Number of rows per group
    Count,
}

/// One of the secondary indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Chronological listing of dated posts
    All,
    Tag,
    /// Per-day buckets
    Date,
    /// Full-text tokens
    Text,
    Person,
}

impl IndexKind {
    /// Every view, in priming order
    pub fn every() -> &'static [IndexKind] {
        &[
            IndexKind::All,
            IndexKind::Tag,
            IndexKind::Date,
            IndexKind::Person,
            IndexKind::Text,
        ]
    }

    /// View name as stored in the design document
    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::All => "all",
            IndexKind::Tag => "tag",
            IndexKind::Date => "date",
            IndexKind::Text => "text",
            IndexKind::Person => "person",
        }
    }

    /// Reduce step, if the view has one
    pub fn reduce(&self) -> Option<Reduce> {
        match self {
            IndexKind::Date => Some(Reduce::Count),
            _ => None,
        }
    }

    /// Keys this view emits for a document
    pub fn emit(&self, doc: &Document) -> Vec<String> {
        match self {
            IndexKind::All => match (non_empty(&doc.path), non_empty(&doc.datetime)) {
                (Some(_), Some(datetime)) => vec![datetime.to_string()],
                _ => Vec::new(),
            },
            IndexKind::Tag => doc.tags.clone(),
            IndexKind::Date => non_empty(&doc.datetime)
                .map(|datetime| vec![date_key(datetime).to_string()])
                .unwrap_or_default(),
            IndexKind::Text => non_empty(&doc.text)
                .map(|text| tokenize(text).map(str::to_string).collect())
                .unwrap_or_default(),
            IndexKind::Person => doc.people.clone(),
        }
    }

    /// Run the map function, producing index entries owned by `doc`
    pub fn map(&self, doc: &Document) -> Vec<IndexEntry> {
        self.emit(doc)
            .into_iter()
            .map(|key| IndexEntry {
                key,
                doc_id: doc.id.clone(),
            })
            .collect()
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndexKind::every()
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown index: {}", s))
    }
}

/// Set of views installed together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub views: Vec<IndexKind>,
}

impl DesignDocument {
    /// The design document declaring all five views
    pub fn standard() -> Self {
        Self {
            id: DESIGN_ID.to_string(),
            views: IndexKind::every().to_vec(),
        }
    }

    pub fn has_view(&self, kind: IndexKind) -> bool {
        self.views.contains(&kind)
    }
}

/// Calendar date portion of an ISO-8601 timestamp
pub fn date_key(datetime: &str) -> &str {
    datetime.split('T').next().unwrap_or(datetime)
}

/// Maximal runs of word characters, digits, hyphens or underscores
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN
        .get_or_init(|| Regex::new(r"[\w-]+").expect("token pattern is valid"))
        .find_iter(text)
        .map(|m| m.as_str())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
