//! Remote store contract
//!
//! The synchronization layer never talks to a concrete database. Everything
//! goes through [`RemoteStore`], the smallest contract the layer needs:
//!
//! - single reads and batched "id in" reads (at most [`MAX_BATCH_SIZE`] ids)
//! - full overwrites, create-if-absent, partial updates and version-checked
//!   partial updates
//! - atomic numeric increments
//! - deletes
//! - document- and collection-level change subscriptions
//! - conditional queries
//!
//! [`MemoryStore`] is a complete in-process implementation, used by the
//! tests and by the CLI (persisted as a JSON snapshot).

mod memory;
mod persistence;
mod query;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::StoreResult;
use crate::model::DocumentId;

pub use memory::{MemoryStore, StatsSnapshot, StoreStats};
pub use query::{Comparator, Condition, Order, Query};

/// Maximum number of ids accepted by one `get_where_id_in` call
pub const MAX_BATCH_SIZE: usize = 10;

/// Field map of a schemaless document
pub type Fields = serde_json::Map<String, Value>;

/// A document as held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub fields: Fields,
    /// Bumped by the store on every successful mutation
    pub version: u64,
}

/// Amount applied by an atomic increment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delta {
    Int(i64),
    Float(f64),
}

/// Live snapshots of a single document; `None` once it is deleted
pub type DocumentWatch = mpsc::UnboundedReceiver<Option<StoredDocument>>;

/// Live snapshots of every document in a collection
pub type CollectionWatch = mpsc::UnboundedReceiver<Vec<StoredDocument>>;

/// Primitives the synchronization layer requires from a document store
///
/// Watches deliver the current state immediately, then one snapshot per
/// change. A watch ends when its receiver is dropped.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>>;

    /// Fetch the documents whose ids are in `ids`; missing ids are omitted
    async fn get_where_id_in(
        &self,
        collection: &str,
        ids: &[DocumentId],
    ) -> StoreResult<Vec<StoredDocument>>;

    /// Overwrite the whole document
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Write the document only if no document with `id` exists
    ///
    /// Returns whether the document was written. The existence check and the
    /// write are a single atomic step.
    async fn create(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<bool>;

    /// Update some fields of an existing document
    async fn update_fields(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Update some fields only if the document is still at `expected_version`
    async fn update_fields_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        fields: Fields,
    ) -> StoreResult<()>;

    /// Atomically add `delta` to a numeric field (a missing field counts as 0)
    ///
    /// Returns the field's value after this increment.
    async fn increment_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: Delta,
    ) -> StoreResult<Value>;

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    async fn watch_document(&self, collection: &str, id: &str) -> StoreResult<DocumentWatch>;

    async fn watch_collection(&self, collection: &str) -> StoreResult<CollectionWatch>;

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<StoredDocument>>;
}
