//! Record and cursor types passed between fetchers, the filter and sinks

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque pagination position, defined by the data source.
///
/// The engine only stores it and hands it back to the fetcher.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    Offset(u64),
    Token(String),
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offset(n) => write!(f, "{n}"),
            Self::Token(s) => f.write_str(s),
        }
    }
}

/// Where an item's pagination stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Position {
    /// Never fetched
    Start,
    /// Next page starts at this cursor
    At(Cursor),
    /// Source reported no more pages
    Exhausted,
}

impl Position {
    pub fn cursor(&self) -> Option<&Cursor> {
        match self {
            Self::At(c) => Some(c),
            Self::Start | Self::Exhausted => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

/// One page of raw records from a [`PageFetcher`](crate::fetch::PageFetcher).
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub records: Vec<RawRecord>,
    /// `None` = item exhausted
    pub next_cursor: Option<Cursor>,
}

/// Source-defined record as delivered by a fetcher.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    /// Build from a JSON value; non-objects yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Non-blank string field, trimmed. Numbers are rendered as strings.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Unsigned count field: a JSON number or a numeric string such as
    /// `"12,500"` or `"12_500"`.
    pub fn count(&self, field: &str) -> Option<u64> {
        match self.0.get(field)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => {
                let digits: String = s
                    .trim()
                    .chars()
                    .filter(|c| !matches!(c, ',' | '_'))
                    .collect();
                digits.parse().ok()
            }
            _ => None,
        }
    }
}

/// Normalized record shape delivered to the publish sink.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub identity: String,
    pub attributes: Map<String, Value>,
    pub source_item: String,
}

impl CanonicalRecord {
    /// Dedup key of this record
    pub fn key(&self) -> String {
        identity_key(&self.identity)
    }
}

/// Normalize an identity into its dedup key: trimmed, leading `@` removed,
/// lower-cased.
pub fn identity_key(identity: &str) -> String {
    identity.trim().trim_start_matches('@').trim().to_lowercase()
}
