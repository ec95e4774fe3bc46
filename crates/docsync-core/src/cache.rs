//! Local document cache
//!
//! An in-process map from `(collection, id)` to the last document observed
//! for that key. Entries are replaced by newer fetches or writes and evicted
//! by deletes; there is no expiry and no size bound.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::model::{CollectionName, Document, DocumentId};

type CacheKey = (CollectionName, DocumentId);

/// Per-type cache of documents, safe for concurrent use
#[derive(Default)]
pub struct LocalCache {
    entries: DashMap<CacheKey, Arc<dyn Any + Send + Sync>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document, replacing any cached value for its id
    pub fn register<D: Document>(&self, document: &D) {
        let key = (D::collection(), document.id().to_string());
        debug!(collection = %key.0, id = %key.1, "cached document");
        self.entries.insert(key, Arc::new(document.clone()));
    }

    /// Get the cached document with this id, if any
    pub fn grab<D: Document>(&self, id: &str) -> Option<D> {
        let entry = self.entries.get(&(D::collection(), id.to_string()))?;
        (**entry).downcast_ref::<D>().cloned()
    }

    /// Drop the cached document with this id
    pub fn evict<D: Document>(&self, id: &str) -> bool {
        self.entries
            .remove(&(D::collection(), id.to_string()))
            .is_some()
    }

    pub fn contains<D: Document>(&self, id: &str) -> bool {
        self.entries.contains_key(&(D::collection(), id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
