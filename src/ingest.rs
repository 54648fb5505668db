//! Bulk import of raw worksheet documents.
//!
//! Accepts either a JSON array of objects or newline-delimited JSON. Each
//! object is stored as-is apart from two adjustments: any `_id` is dropped
//! in favour of a fresh identifier, and a missing `createdAt` is stamped
//! with the import time.

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::models::{fields, format_timestamp, RawDocument};
use crate::store::{sqlite::SqliteStore, DocumentStore};

/// Outcome of an import run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub inserted: usize,
    pub skipped: usize,
}

/// Splits `input` into JSON values. A leading `[` means one array;
/// otherwise each non-blank line is a document.
pub fn parse_documents(input: &str) -> Result<Vec<Value>> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('[') {
        let values: Vec<Value> =
            serde_json::from_str(trimmed).context("input is not a valid JSON array")?;
        return Ok(values);
    }

    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}: invalid JSON", i + 1))
        })
        .collect()
}

/// Stores every object in `values`; non-objects are skipped and counted.
pub async fn import_values(store: &dyn DocumentStore, values: Vec<Value>) -> Result<ImportStats> {
    let mut stats = ImportStats::default();
    let stamp = format_timestamp(&Utc::now());

    for value in values {
        let Value::Object(mut doc) = value else {
            stats.skipped += 1;
            continue;
        };
        stamp_created_at(&mut doc, &stamp);
        store.insert(doc).await?;
        stats.inserted += 1;
    }

    Ok(stats)
}

fn stamp_created_at(doc: &mut RawDocument, stamp: &str) {
    let missing = matches!(doc.get(fields::CREATED_AT), None | Some(Value::Null));
    if missing {
        doc.insert(fields::CREATED_AT.to_string(), Value::String(stamp.to_string()));
    }
}

/// CLI entry point for `wks import`.
pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {}", path.display()))?;
    let values = parse_documents(&input)?;

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let stats = import_values(&store, values).await?;
    store.close().await;

    tracing::info!(inserted = stats.inserted, skipped = stats.skipped, "import finished");
    println!("imported worksheets: {}", stats.inserted);
    if stats.skipped > 0 {
        println!("skipped entries: {}", stats.skipped);
    }
    Ok(())
}
