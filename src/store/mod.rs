//! Storage abstraction for the worksheet collection.
//!
//! The [`DocumentStore`] trait is the seam between the retrieval service and
//! the persistent collection. Backends:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`sqlite::SqliteStore`] | SQLite with JSON1, one JSON document per row |
//! | [`memory::InMemoryStore`] | `RwLock<BTreeMap>`, for tests |
//!
//! Both backends share one ordering for raw field values: missing/null
//! sorts below numbers and booleans, which sort below strings. Descending
//! scans therefore put documents without a `createdAt` last. Ties are
//! broken by identifier, descending.
//!
//! Implementations must be `Send + Sync`; the retrieval service holds one
//! behind an `Arc` for the lifetime of the process.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ObjectId, RawDocument, StoredDocument};
use crate::query::{Filter, FindOptions};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Sorted, windowed scan over documents matching `filter`.
    async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<StoredDocument>>;

    /// Number of documents matching `filter`.
    async fn count(&self, filter: &Filter) -> Result<u64>;

    /// Distinct string values of `field`, in no particular order.
    async fn distinct(&self, field: &str) -> Result<Vec<String>>;

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<StoredDocument>>;

    /// Returns `false` when nothing was deleted.
    async fn delete_by_id(&self, id: &ObjectId) -> Result<bool>;

    /// Stores `doc` under a fresh identifier. Any `_id` key is dropped.
    async fn insert(&self, doc: RawDocument) -> Result<ObjectId>;

    /// Round trip to check the backend is reachable.
    async fn ping(&self) -> Result<()>;
}
