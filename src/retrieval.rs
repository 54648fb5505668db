//! Retrieval service: query builder + store + normalization.
//!
//! Every operation is a single independent round trip (two for the paged
//! listing, issued concurrently). Store failures surface immediately as
//! [`RetrievalError::StoreUnavailable`]; there are no retries.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::config::PaginationConfig;
use crate::error::{Result, RetrievalError};
use crate::models::{fields, ObjectId, PaginationEnvelope, WorksheetRecord};
use crate::normalize::normalize;
use crate::query::{ListQuery, PageRequest};
use crate::store::DocumentStore;

/// Read-mostly facade over the worksheet collection.
///
/// Holds the store handle injected at construction; cloning shares it.
#[derive(Clone)]
pub struct RetrievalService {
    store: Arc<dyn DocumentStore>,
    pagination: PaginationConfig,
}

impl RetrievalService {
    pub fn new(store: Arc<dyn DocumentStore>, pagination: PaginationConfig) -> Self {
        Self { store, pagination }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// One page of worksheets plus pagination metadata.
    pub async fn list_worksheets(
        &self,
        req: &PageRequest,
    ) -> Result<PaginationEnvelope<WorksheetRecord>> {
        let query = ListQuery::worksheets(req, self.pagination.default_limit);
        tracing::debug!(page = query.page, limit = query.limit, filter = ?query.filter, "listing worksheets");

        let (docs, total) = tokio::try_join!(
            self.store.find(&query.filter, &query.options),
            self.store.count(&query.filter),
        )?;

        let items = docs.iter().map(normalize).collect();
        Ok(PaginationEnvelope::new(items, query.page, query.limit, total))
    }

    pub async fn get_worksheet_by_id(&self, id: &str) -> Result<WorksheetRecord> {
        let oid = parse_id(id)?;
        match self.store.find_by_id(&oid).await? {
            Some(doc) => Ok(normalize(&doc)),
            None => Err(RetrievalError::NotFound(id.to_string())),
        }
    }

    /// Worksheets whose subject contains `subject`, without envelope.
    pub async fn list_worksheets_by_subject(
        &self,
        subject: &str,
        req: &PageRequest,
    ) -> Result<Vec<WorksheetRecord>> {
        let query = ListQuery::by_subject(subject, req, self.pagination.subject_limit);
        let docs = self.store.find(&query.filter, &query.options).await?;
        Ok(docs.iter().map(normalize).collect())
    }

    /// Newest worksheets from the last `days` days, capped.
    pub async fn list_recent_worksheets(&self, days: Option<&str>) -> Result<Vec<WorksheetRecord>> {
        let query = ListQuery::recent(
            days,
            self.pagination.recent_days,
            self.pagination.recent_limit,
            Utc::now(),
        );
        let docs = self.store.find(&query.filter, &query.options).await?;
        Ok(docs.iter().map(normalize).collect())
    }

    /// Distinct raw subject values across the collection, blank values
    /// dropped, sorted ascending.
    pub async fn list_distinct_subjects(&self) -> Result<Vec<String>> {
        let mut subjects = BTreeSet::new();
        for field in fields::SUBJECT_SOURCES {
            for value in self.store.distinct(field).await? {
                if !value.trim().is_empty() {
                    subjects.insert(value);
                }
            }
        }
        Ok(subjects.into_iter().collect())
    }

    /// Deletes one worksheet. A repeated delete yields `NotFound`.
    pub async fn delete_worksheet(&self, id: &str) -> Result<()> {
        let oid = parse_id(id)?;
        if self.store.delete_by_id(&oid).await? {
            tracing::info!(id = %oid, "worksheet deleted");
            Ok(())
        } else {
            Err(RetrievalError::NotFound(id.to_string()))
        }
    }
}

fn parse_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse(id).ok_or_else(|| RetrievalError::InvalidIdentifier(id.to_string()))
}
