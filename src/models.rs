//! Core data models used throughout the worksheet store.
//!
//! Raw documents are loosely-typed JSON maps and only exist at the store
//! boundary. Everything past [`crate::normalize`] works with
//! [`WorksheetRecord`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stored field names, exactly as the ingestion process writes them.
pub mod fields {
    pub const CHAT_INPUT: &str = "chatInput";
    pub const SUBJECT: &str = "subject";
    pub const TEXT: &str = "text";
    pub const HTML_OUTPUT: &str = "htmlOutput";
    pub const COMBINED_AT: &str = "combined_at";
    pub const CREATED_AT: &str = "createdAt";
    pub const USER_EMAIL: &str = "userEmail";
    pub const ID: &str = "_id";

    /// Subject sources in fallback order.
    pub const SUBJECT_SOURCES: [&str; 2] = [CHAT_INPUT, SUBJECT];
    /// Content sources in fallback order.
    pub const CONTENT_SOURCES: [&str; 2] = [TEXT, HTML_OUTPUT];
}

/// A schema-less document as held by the store.
pub type RawDocument = serde_json::Map<String, serde_json::Value>;

/// Store-assigned identifier: 24 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    pub const LEN: usize = 24;

    /// Four big-endian timestamp bytes followed by eight random bytes.
    pub fn generate() -> Self {
        let secs = Utc::now().timestamp() as u32;
        let random = uuid::Uuid::new_v4();
        let tail: String = random.as_bytes()[..8]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        ObjectId(format!("{:08x}{}", secs, tail))
    }

    /// Returns `None` unless `s` is exactly 24 hex digits.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() == Self::LEN && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(ObjectId(s.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document together with its primary key, as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: ObjectId,
    pub fields: RawDocument,
}

/// Normalized worksheet. Immutable view derived from a stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct WorksheetRecord {
    pub id: String,
    pub subject: String,
    /// Rich-text markup. Untrusted.
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// The `combined_at` value as stored: strings verbatim, other values
    /// as JSON text. `None` when absent or null.
    pub created_at_raw: Option<String>,
    /// `true` when `created_at` is the normalization time rather than a
    /// parsed value.
    pub created_at_defaulted: bool,
    pub user_email: Option<String>,
}

/// Wire shape of a worksheet. Uses the stored field names so that clients
/// can run it back through the same normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorksheetDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "chatInput")]
    pub chat_input: String,
    pub text: String,
    pub combined_at: String,
    #[serde(rename = "userEmail", default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(rename = "dateDefaulted", default)]
    pub date_defaulted: bool,
}

impl From<&WorksheetRecord> for WorksheetDocument {
    fn from(record: &WorksheetRecord) -> Self {
        Self {
            id: record.id.clone(),
            chat_input: record.subject.clone(),
            text: record.content.clone(),
            combined_at: format_timestamp(&record.created_at),
            user_email: record.user_email.clone(),
            date_defaulted: record.created_at_defaulted,
        }
    }
}

/// One page of results plus the metadata needed to page through the rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationEnvelope<T> {
    pub items: Vec<T>,
    pub current_page: i64,
    pub per_page: i64,
    pub total_pages: u64,
    pub total_items: u64,
}

impl<T> PaginationEnvelope<T> {
    pub fn new(items: Vec<T>, current_page: i64, per_page: i64, total_items: u64) -> Self {
        Self {
            items,
            current_page,
            per_page,
            total_pages: total_pages(total_items, per_page),
            total_items,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginationEnvelope<U> {
        PaginationEnvelope {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            total_pages: self.total_pages,
            total_items: self.total_items,
        }
    }
}

/// `ceil(total_items / per_page)`, and 0 for an empty collection.
pub fn total_pages(total_items: u64, per_page: i64) -> u64 {
    if total_items == 0 || per_page < 1 {
        return 0;
    }
    total_items.div_ceil(per_page as u64)
}

/// RFC 3339 with millisecond precision in UTC. Strings in this format sort
/// chronologically, which the store relies on for `createdAt`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
