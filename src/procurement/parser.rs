//! Best-effort parsing of the procurement results payload
//!
//! A well-formed body is parsed as JSON. A body that is not valid JSON is
//! salvaged: the text between the first `[` and the last `]` is split into
//! top-level objects and each one is parsed on its own, so a single broken
//! record does not cost the rest of the batch.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::BookRecord;

/// Why an entry of the payload was not turned into a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No `isbn` (or `isbn: null`); a gap in the data, not an error
    MissingIsbn,
    /// Not an object, not parseable, or an ISBN that is not an integer
    Malformed(String),
}

/// Result of parsing one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Parsed(BookRecord),
    Skipped(SkipReason),
}

impl RecordOutcome {
    pub fn record(&self) -> Option<&BookRecord> {
        match self {
            RecordOutcome::Parsed(record) => Some(record),
            RecordOutcome::Skipped(_) => None,
        }
    }

    fn malformed(reason: impl Into<String>) -> Self {
        RecordOutcome::Skipped(SkipReason::Malformed(reason.into()))
    }
}

/// Parse a results body into per-entry outcomes, in server order
pub fn parse_results(body: &str) -> Vec<RecordOutcome> {
    let body = body.trim();
    if body.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Value>(body) {
        Ok(document) => match record_array(document) {
            Some(entries) => entries.into_iter().map(parse_entry).collect(),
            None => {
                debug!("Results document holds no record array");
                Vec::new()
            },
        },
        Err(e) => {
            warn!(error = %e, "Results body is not valid JSON, salvaging records");
            salvage(body)
        },
    }
}

/// A top-level array, or the first array-valued field of a top-level object
fn record_array(document: Value) -> Option<Vec<Value>> {
    match document {
        Value::Array(entries) => Some(entries),
        Value::Object(fields) => fields.into_iter().find_map(|(_, value)| match value {
            Value::Array(entries) => Some(entries),
            _ => None,
        }),
        _ => None,
    }
}

fn salvage(body: &str) -> Vec<RecordOutcome> {
    let (Some(open), Some(close)) = (body.find('['), body.rfind(']')) else {
        warn!("No record array found in results body");
        return Vec::new();
    };
    if close <= open {
        warn!("No record array found in results body");
        return Vec::new();
    }

    split_objects(&body[open + 1..close])
        .into_iter()
        .map(|fragment| match serde_json::from_str::<Value>(fragment) {
            Ok(entry) => parse_entry(entry),
            Err(e) => RecordOutcome::malformed(format!("unparseable record: {}", e)),
        })
        .collect()
}

/// Split text into top-level `{...}` fragments by brace depth
///
/// Braces inside JSON strings are ignored. An object left open at the end
/// of the text is returned as is and fails to parse later.
fn split_objects(text: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            },
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        fragments.push(&text[s..=i]);
                    }
                }
            },
            _ => {},
        }
    }

    if let Some(s) = start {
        fragments.push(&text[s..]);
    }

    fragments
}

fn parse_entry(entry: Value) -> RecordOutcome {
    let fields = match entry {
        Value::Object(fields) => fields,
        other => return RecordOutcome::malformed(format!("entry is not an object: {}", other)),
    };

    let isbn = match fields.get("isbn") {
        None | Some(Value::Null) => return RecordOutcome::Skipped(SkipReason::MissingIsbn),
        Some(value) => match isbn_value(value) {
            Some(isbn) => isbn,
            None => return RecordOutcome::malformed(format!("isbn is not an integer: {}", value)),
        },
    };

    RecordOutcome::Parsed(BookRecord {
        isbn,
        title: text_field(&fields, "title"),
        category: text_field(&fields, "category"),
        cover_image: text_field(&fields, "coverimage"),
    })
}

fn isbn_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn text_field(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
