//! SQLite-backed [`DocumentStore`].
//!
//! Documents live as JSON text in `worksheets.doc`. Filters compile to
//! `json_extract` expressions with field paths and values bound as
//! parameters. The sort path is the one literal, restricted to plain
//! identifiers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::models::{fields, format_timestamp, ObjectId, RawDocument, StoredDocument};
use crate::query::{Filter, FindOptions};

use super::DocumentStore;

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Releases the pool. Pending queries finish first.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}

/// Appends the SQL for `filter` to `sql`, pushing bind values in order.
fn compile_filter(filter: &Filter, sql: &mut String, binds: &mut Vec<String>) {
    match filter {
        Filter::All => sql.push_str("1 = 1"),
        Filter::Contains { field, needle } => {
            sql.push_str(
                "(json_type(doc, ?) = 'text' AND instr(lower(json_extract(doc, ?)), lower(?)) > 0)",
            );
            binds.push(json_path(field));
            binds.push(json_path(field));
            binds.push(needle.clone());
        }
        Filter::Any(parts) if parts.is_empty() => sql.push_str("0 = 1"),
        Filter::Any(parts) => {
            sql.push('(');
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" OR ");
                }
                compile_filter(part, sql, binds);
            }
            sql.push(')');
        }
        Filter::Since { field, cutoff } => {
            sql.push_str(
                "(json_type(doc, ?) = 'text' \
                 AND json_extract(doc, ?) GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]*' \
                 AND julianday(json_extract(doc, ?)) >= julianday(?))",
            );
            for _ in 0..3 {
                binds.push(json_path(field));
            }
            binds.push(format_timestamp(cutoff));
        }
    }
}

/// Literal path for ORDER BY, spelled like the `createdAt` index so the
/// planner can use it. Only plain identifiers are accepted.
fn sort_path(field: &str) -> Result<String> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        anyhow::bail!("unsupported sort field: {}", field);
    }
    Ok(format!("'$.{}'", field))
}

fn where_clause(filter: &Filter) -> (String, Vec<String>) {
    let mut sql = String::new();
    let mut binds = Vec::new();
    compile_filter(filter, &mut sql, &mut binds);
    (sql, binds)
}

fn decode_row(row: &SqliteRow) -> Result<Option<StoredDocument>> {
    let id: String = row.try_get("id")?;
    let doc: String = row.try_get("doc")?;

    let Some(id) = ObjectId::parse(&id) else {
        tracing::warn!(id = %id, "skipping row with malformed identifier");
        return Ok(None);
    };

    let fields = match serde_json::from_str::<Value>(&doc) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::warn!(id = %id, "stored document is not a JSON object; treating as empty");
            RawDocument::new()
        }
    };

    Ok(Some(StoredDocument { id, fields }))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<StoredDocument>> {
        let (clause, binds) = where_clause(filter);
        let sql = format!(
            "SELECT id, doc FROM worksheets WHERE {} \
             ORDER BY json_extract(doc, {}) DESC, id DESC LIMIT ? OFFSET ?",
            clause,
            sort_path(&options.sort_field)?
        );

        let limit = options
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);
        let skip = i64::try_from(options.skip).unwrap_or(i64::MAX);

        let mut query = sqlx::query(&sql);
        for b in binds {
            query = query.bind(b);
        }
        let rows = query
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await
            .context("worksheet scan failed")?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(doc) = decode_row(row)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let (clause, binds) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM worksheets WHERE {}", clause);

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for b in binds {
            query = query.bind(b);
        }
        let n = query
            .fetch_one(&self.pool)
            .await
            .context("worksheet count failed")?;
        Ok(n.max(0) as u64)
    }

    async fn distinct(&self, field: &str) -> Result<Vec<String>> {
        let path = json_path(field);
        let values: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT json_extract(doc, ?) FROM worksheets WHERE json_type(doc, ?) = 'text'",
        )
        .bind(&path)
        .bind(&path)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("distinct scan of {} failed", field))?;
        Ok(values)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<StoredDocument>> {
        let row = sqlx::query("SELECT id, doc FROM worksheets WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("worksheet lookup failed")?;

        match row {
            Some(row) => decode_row(&row),
            None => Ok(None),
        }
    }

    async fn delete_by_id(&self, id: &ObjectId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM worksheets WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .context("worksheet delete failed")?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert(&self, mut doc: RawDocument) -> Result<ObjectId> {
        doc.remove(fields::ID);
        let id = ObjectId::generate();
        let body = serde_json::to_string(&Value::Object(doc))?;

        sqlx::query("INSERT INTO worksheets (id, doc) VALUES (?, ?)")
            .bind(id.as_str())
            .bind(body)
            .execute(&self.pool)
            .await
            .context("worksheet insert failed")?;
        Ok(id)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database ping failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::TimeZone;
    use serde_json::json;

    async fn open_store(dir: &tempfile::TempDir) -> SqliteStore {
        let mut config = Config::minimal();
        config.db.path = dir.path().join("test.sqlite");
        let pool = crate::db::connect(&config).await.unwrap();
        crate::migrate::apply(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn doc(value: Value) -> RawDocument {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_compile_nested_filter() {
        let filter = Filter::Any(vec![
            Filter::Contains {
                field: "chatInput".into(),
                needle: "alg".into(),
            },
            Filter::All,
        ]);
        let (sql, binds) = where_clause(&filter);
        assert!(sql.starts_with('('));
        assert!(sql.contains(" OR 1 = 1"));
        assert_eq!(binds, vec!["$.\"chatInput\"", "$.\"chatInput\"", "alg"]);
    }

    #[test]
    fn test_sort_path_accepts_identifiers_only() {
        assert_eq!(sort_path("createdAt").unwrap(), "'$.createdAt'");
        assert!(sort_path("x') DESC; DROP TABLE worksheets; --").is_err());
        assert!(sort_path("").is_err());
    }

    #[tokio::test]
    async fn test_contains_is_case_insensitive_and_string_only() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store
            .insert(doc(json!({"chatInput": "Algebra Basics"})))
            .await
            .unwrap();
        store.insert(doc(json!({"chatInput": 1234}))).await.unwrap();

        for needle in ["algebra", "BASICS", "ra ba"] {
            let filter = Filter::Contains {
                field: "chatInput".into(),
                needle: needle.into(),
            };
            assert_eq!(store.count(&filter).await.unwrap(), 1, "needle {}", needle);
        }
        let numeric = Filter::Contains {
            field: "chatInput".into(),
            needle: "23".into(),
        };
        assert_eq!(store.count(&numeric).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_since_matches_dates_only() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        for created in [
            json!("2024-03-08T10:00:00.000Z"),
            json!("2024-03-08T09:00:00+01:00"),
            json!("2024-03-09"),
            json!("2024-03-01T00:00:00.000Z"),
            json!("unknown"),
            json!("now"),
            json!({"$date": "2024-03-08T00:00:00Z"}),
            json!(2460400),
        ] {
            store.insert(doc(json!({"createdAt": created}))).await.unwrap();
        }

        let filter = Filter::Since {
            field: "createdAt".into(),
            cutoff: chrono::Utc.with_ymd_and_hms(2024, 3, 7, 0, 0, 0).unwrap(),
        };
        assert_eq!(store.count(&filter).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_sort_field_sorts_last() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        let none = store.insert(doc(json!({"chatInput": "none"}))).await.unwrap();
        let old = store
            .insert(doc(json!({"createdAt": "2023-01-01T00:00:00.000Z"})))
            .await
            .unwrap();
        let new = store
            .insert(doc(json!({"createdAt": "2024-01-01T00:00:00.000Z"})))
            .await
            .unwrap();

        let options = FindOptions {
            sort_field: "createdAt".into(),
            skip: 0,
            limit: None,
        };
        let ids: Vec<ObjectId> = store
            .find(&Filter::All, &options)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![new, old, none]);
    }

    #[tokio::test]
    async fn test_insert_drops_client_id_and_delete_reports_miss() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        let id = store
            .insert(doc(json!({"_id": "ignored", "text": "<p>x</p>"})))
            .await
            .unwrap();

        let found = store.find_by_id(&id).await.unwrap().unwrap();
        assert!(!found.fields.contains_key("_id"));
        assert!(store.delete_by_id(&id).await.unwrap());
        assert!(!store.delete_by_id(&id).await.unwrap());
        assert!(store.find_by_id(&id).await.unwrap().is_none());
    }
}
