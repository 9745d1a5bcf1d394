//! Post Parser - raw flat-file post into a `Document`
//!
//! ```text
//! datetime: 2020-01-02T10:00:00     ┐
//! tags: rust, databases             │ header: "key: value" lines
//! title: Hello                      ┘
//!                                   ← first blank line
//! Body text until end of file.      ← text
//! ```

use crate::ingest::source::PostRef;
use crate::store::Document;

/// Header keys that may never override identity or body
const RESERVED_KEYS: &[&str] = &["_id", "id", "path", "text"];

/// Parse one raw post
///
/// Identity (`id`, `path`) comes from `post`, never from content.
pub fn parse_post(raw: &str, post: &PostRef) -> Document {
    let (header, text) = match raw.split_once("\n\n") {
        Some((header, text)) => (header, text),
        None => ("", raw),
    };

    let mut doc = Document::new(&post.id).path(&post.path).text(text);

    for line in header.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        // exactly one separator, otherwise the line is skipped
        let mut parts = line.split(": ");
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        if RESERVED_KEYS.contains(&key) {
            continue;
        }

        match key {
            "datetime" => doc.datetime = Some(value.to_string()),
            "tags" => doc.tags = split_list(value),
            "people" => doc.people = split_list(value),
            _ => {
                doc.fields.insert(key.to_string(), value.to_string());
            }
        }
    }

    doc
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|part| part.trim().to_string())
        .collect()
}
