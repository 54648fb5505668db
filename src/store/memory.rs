//! In-memory [`DocumentStore`] implementation for tests.
//!
//! Mirrors the SQLite backend's filter and ordering semantics, including
//! ASCII-only case folding for substring matches.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{fields, ObjectId, RawDocument, StoredDocument};
use crate::normalize::parse_timestamp;
use crate::query::{Filter, FindOptions};

use super::DocumentStore;

/// In-memory store keyed by identifier.
pub struct InMemoryStore {
    docs: RwLock<BTreeMap<ObjectId, RawDocument>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

/// Type class used for cross-type comparison: null < number/bool < text.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) | Some(Value::Number(_)) => 1,
        Some(_) => 2,
    }
}

fn as_number(value: &Value) -> f64 {
    match value {
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Native ordering of two raw field values.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Some(x), Some(y)) if ra == 1 => as_number(x)
            .partial_cmp(&as_number(y))
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) if ra == 2 => as_text(x).cmp(&as_text(y)),
        _ => Ordering::Equal,
    }
}

/// `YYYY-MM-DD` at the start of the string.
fn has_date_prefix(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 10
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
}

fn matches(filter: &Filter, doc: &RawDocument) -> bool {
    match filter {
        Filter::All => true,
        Filter::Contains { field, needle } => doc
            .get(field)
            .and_then(Value::as_str)
            .map(|s| {
                s.to_ascii_lowercase()
                    .contains(&needle.to_ascii_lowercase())
            })
            .unwrap_or(false),
        Filter::Any(parts) => parts.iter().any(|p| matches(p, doc)),
        Filter::Since { field, cutoff } => doc
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| has_date_prefix(s))
            .and_then(|s| parse_timestamp(&Value::String(s.to_string())))
            .map(|ts| ts >= *cutoff)
            .unwrap_or(false),
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<StoredDocument>> {
        let docs = self.docs.read().map_err(poisoned)?;
        let mut hits: Vec<(&ObjectId, &RawDocument)> =
            docs.iter().filter(|(_, d)| matches(filter, d)).collect();

        let key = options.sort_field.as_str();
        hits.sort_by(|(ida, a), (idb, b)| {
            compare_values(b.get(key), a.get(key)).then_with(|| idb.cmp(ida))
        });

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(hits
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|(id, d)| StoredDocument {
                id: id.clone(),
                fields: d.clone(),
            })
            .collect())
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.values().filter(|d| matches(filter, d)).count() as u64)
    }

    async fn distinct(&self, field: &str) -> Result<Vec<String>> {
        let docs = self.docs.read().map_err(poisoned)?;
        let values: BTreeSet<String> = docs
            .values()
            .filter_map(|d| d.get(field).and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        Ok(values.into_iter().collect())
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<StoredDocument>> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.get(id).map(|d| StoredDocument {
            id: id.clone(),
            fields: d.clone(),
        }))
    }

    async fn delete_by_id(&self, id: &ObjectId) -> Result<bool> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        Ok(docs.remove(id).is_some())
    }

    async fn insert(&self, mut doc: RawDocument) -> Result<ObjectId> {
        doc.remove(fields::ID);
        let mut docs = self.docs.write().map_err(poisoned)?;
        let mut id = ObjectId::generate();
        while docs.contains_key(&id) {
            id = ObjectId::generate();
        }
        docs.insert(id.clone(), doc);
        Ok(id)
    }

    async fn ping(&self) -> Result<()> {
        let _guard = self.docs.read().map_err(poisoned)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn raw(value: Value) -> RawDocument {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_native_ordering() {
        let s = json!("2024");
        let n = json!(2024);
        assert_eq!(compare_values(None, Some(&n)), Ordering::Less);
        assert_eq!(compare_values(Some(&Value::Null), None), Ordering::Equal);
        assert_eq!(compare_values(Some(&n), Some(&s)), Ordering::Less);
        assert_eq!(
            compare_values(Some(&json!("2023")), Some(&s)),
            Ordering::Less
        );
    }

    #[test]
    fn test_since_accepts_date_strings_only() {
        let filter = Filter::Since {
            field: "createdAt".into(),
            cutoff: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let hit = |created: Value| matches(&filter, &raw(json!({ "createdAt": created })));

        assert!(hit(json!("2024-02-01T00:00:00.000Z")));
        assert!(hit(json!("2024-01-01")));
        assert!(hit(json!("2024-01-01T00:30:00+00:30")));
        assert!(!hit(json!("2023-12-31T00:00:00.000Z")));
        assert!(!hit(json!("unknown")));
        assert!(!hit(json!("N/A")));
        assert!(!hit(json!({"$date": "2024-02-01T00:00:00Z"})));
        assert!(!hit(json!(1_706_745_600_000i64)));
        assert!(!matches(&filter, &raw(json!({}))));
    }

    #[tokio::test]
    async fn test_window_and_order() {
        let store = InMemoryStore::new();
        for day in 1..=5 {
            store
                .insert(raw(json!({"createdAt": format!("2024-01-0{}T00:00:00.000Z", day)})))
                .await
                .unwrap();
        }
        let options = FindOptions {
            sort_field: "createdAt".into(),
            skip: 1,
            limit: Some(2),
        };
        let page = store.find(&Filter::All, &options).await.unwrap();
        let dates: Vec<&str> = page
            .iter()
            .map(|d| d.fields["createdAt"].as_str().unwrap())
            .collect();
        assert_eq!(
            dates,
            vec!["2024-01-04T00:00:00.000Z", "2024-01-03T00:00:00.000Z"]
        );
    }
}
