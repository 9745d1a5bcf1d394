//! Core data types for the Zine document store
//!
//! This module defines the fundamental types exchanged with the store:
//! - `Document`: One ingested post or page
//! - `Row`: One row of a view query result
//! - `QueryOptions` and `Staleness`: How a view is read
//! - `StoreInfo` and `BulkResult`: Store metadata and per-item write results

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Id prefix reserved for design documents
pub const DESIGN_PREFIX: &str = "_design/";

/// A post or page record
///
/// Serialized with the store's `_id` convention. Header fields that are not
/// indexed are flattened into the body next to the typed ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Derived from the source filename, never from content
    #[serde(rename = "_id")]
    pub id: String,
    /// Location of the raw file relative to the post source root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// ISO-8601 timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub people: Vec<String>,
    /// Body content (everything after the header block)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Any other header field (author, title, ...)
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl Document {
    /// Create an empty document with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Builder method: set the source path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Builder method: set the timestamp
    pub fn datetime(mut self, datetime: impl Into<String>) -> Self {
        self.datetime = Some(datetime.into());
        self
    }

    /// Builder method: add a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Builder method: add a person
    pub fn person(mut self, person: impl Into<String>) -> Self {
        self.people.push(person.into());
        self
    }

    /// Builder method: set the body
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder method: set an extra header field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Look up an extra header field
    pub fn get_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Whether this id names a design document
    pub fn is_design_id(id: &str) -> bool {
        id.starts_with(DESIGN_PREFIX)
    }
}

/// One row of a view query
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Row {
    /// Emitting document (absent on reduced rows)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key: Value,
    pub value: Value,
    /// Populated only when the query asked for `include_docs`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,
}

impl Row {
    /// Row emitted by a map function
    pub fn mapped(key: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            id: Some(doc_id.into()),
            key: Value::String(key.into()),
            value: Value::Null,
            doc: None,
        }
    }

    /// Row produced by a count reduce
    pub fn reduced(key: Value, count: u64) -> Self {
        Self {
            id: None,
            key,
            value: Value::from(count),
            doc: None,
        }
    }

    /// Key as a string, if it is one
    pub fn key_str(&self) -> Option<&str> {
        self.key.as_str()
    }

    /// Value as a count, if it is one
    pub fn count(&self) -> Option<u64> {
        self.value.as_u64()
    }
}

/// Whether a read waits for the view to catch up with the documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Staleness {
    /// Bring the view up to date, then read
    #[default]
    Update,
    /// Read whatever is materialized
    Ok,
    /// Read whatever is materialized, then build in the background
    UpdateAfter,
}

/// Options for a view query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Restrict to these keys, returned in this order
    pub keys: Option<Vec<String>>,
    pub include_docs: bool,
    /// Run the view's reduce (defaults to true for views that have one)
    pub reduce: Option<bool>,
    /// Group reduced rows by key
    pub group: bool,
    pub stale: Staleness,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: restrict to keys
    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Builder method: include documents inline
    pub fn include_docs(mut self, include: bool) -> Self {
        self.include_docs = include;
        self
    }

    /// Builder method: enable or disable the reduce step
    pub fn reduce(mut self, reduce: bool) -> Self {
        self.reduce = Some(reduce);
        self
    }

    /// Builder method: group reduced rows by key
    pub fn group(mut self, group: bool) -> Self {
        self.group = group;
        self
    }

    /// Builder method: set the staleness mode
    pub fn stale(mut self, stale: Staleness) -> Self {
        self.stale = stale;
        self
    }
}

/// Store metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    /// Number of documents, design documents included
    pub doc_count: u64,
    /// Sequence number of the latest write
    pub update_seq: i64,
}

/// Outcome of one document in a bulk insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkStatus {
    Created,
    /// A document with this id already exists
    Conflict,
    /// The document could not be stored at all
    Rejected(String),
}

/// Per-item result of a bulk insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkResult {
    pub id: String,
    pub status: BulkStatus,
}

impl BulkResult {
    pub fn is_ok(&self) -> bool {
        self.status == BulkStatus::Created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_builder() {
        let doc = Document::new("hello")
            .path("txt/hello.md")
            .datetime("2020-01-02T00:00:00")
            .tag("a")
            .tag("b")
            .person("ada")
            .text("Hello")
            .field("author", "grace");

        assert_eq!(doc.id, "hello");
        assert_eq!(doc.tags, vec!["a", "b"]);
        assert_eq!(doc.people, vec!["ada"]);
        assert_eq!(doc.get_field("author"), Some("grace"));
        assert_eq!(doc.get_field("title"), None);
    }

    #[test]
    fn test_document_json_shape() {
        let doc = Document::new("hello")
            .datetime("2020-01-02T00:00:00")
            .tag("a")
            .field("title", "Hi");

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], "hello");
        assert_eq!(json["title"], "Hi");
        assert_eq!(json["tags"], serde_json::json!(["a"]));
        assert!(json.get("people").is_none());
        assert!(json.get("path").is_none());

        let back: Document = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_design_id() {
        assert!(Document::is_design_id("_design/index"));
        assert!(!Document::is_design_id("about"));
    }

    #[test]
    fn test_row_accessors() {
        let row = Row::mapped("2020-01-02", "hello");
        assert_eq!(row.key_str(), Some("2020-01-02"));
        assert_eq!(row.count(), None);

        let row = Row::reduced(Value::String("2020-01-02".into()), 2);
        assert_eq!(row.count(), Some(2));
        assert!(row.id.is_none());
    }

    #[test]
    fn test_query_options_builder() {
        let options = QueryOptions::new()
            .keys(["a", "b"])
            .include_docs(true)
            .reduce(false)
            .stale(Staleness::UpdateAfter);

        assert_eq!(options.keys, Some(vec!["a".to_string(), "b".to_string()]));
        assert!(options.include_docs);
        assert_eq!(options.reduce, Some(false));
        assert!(!options.group);
        assert_eq!(options.stale, Staleness::UpdateAfter);
        assert_eq!(QueryOptions::new().stale, Staleness::Update);
    }
}
