//! Raw document → [`WorksheetRecord`].
//!
//! Normalization is total: any input, including an empty map or a value
//! that is not an object at all, yields a record with a non-empty subject,
//! non-empty content and a valid timestamp.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::models::{fields, RawDocument, StoredDocument, WorksheetRecord};

pub const UNKNOWN_SUBJECT: &str = "Unknown Subject";
pub const EMPTY_CONTENT: &str = "<p>No content available</p>";

/// Normalizes a document read from the store.
pub fn normalize(doc: &StoredDocument) -> WorksheetRecord {
    normalize_fields(doc.id.as_str(), &doc.fields, Utc::now())
}

/// Normalizes a JSON value received over the wire. The identifier is taken
/// from `_id` (plain string or `{"$oid": ..}`).
pub fn normalize_value(value: &Value) -> WorksheetRecord {
    let empty = RawDocument::new();
    let map = value.as_object().unwrap_or(&empty);
    let id = map.get(fields::ID).map(id_text).unwrap_or_default();
    normalize_fields(&id, map, Utc::now())
}

/// Applies the fallback chains. `now` is substituted when `combined_at` is
/// missing or unparsable.
pub fn normalize_fields(id: &str, map: &RawDocument, now: DateTime<Utc>) -> WorksheetRecord {
    let subject = first_non_empty(map, &fields::SUBJECT_SOURCES).unwrap_or(UNKNOWN_SUBJECT);
    let content = first_non_empty(map, &fields::CONTENT_SOURCES).unwrap_or(EMPTY_CONTENT);

    let raw_ts = map.get(fields::COMBINED_AT);
    let parsed = raw_ts.and_then(parse_timestamp);

    WorksheetRecord {
        id: id.to_string(),
        subject: subject.to_string(),
        content: content.to_string(),
        created_at: parsed.unwrap_or(now),
        created_at_raw: raw_ts.and_then(raw_text),
        created_at_defaulted: parsed.is_none(),
        user_email: first_non_empty(map, &[fields::USER_EMAIL]).map(str::to_string),
    }
}

/// Strings verbatim, other non-null values as their JSON text.
fn raw_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// First key whose value is a string with non-whitespace content.
fn first_non_empty<'a>(map: &'a RawDocument, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| map.get(*k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(o) => o.get("$oid").map(id_text).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Parses an ISO-8601 timestamp. Accepts RFC 3339, zone-less date-times
/// (read as UTC), bare dates, epoch milliseconds and `{"$date": ..}`
/// wrappers.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(o) => o.get("$date").and_then(parse_timestamp),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
