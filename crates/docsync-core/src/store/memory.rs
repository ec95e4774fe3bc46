//! In-process document store
//!
//! Implements the full [`RemoteStore`] contract over a map of collections.
//! Every mutation bumps a store-wide version counter, so versions never
//! repeat even across delete and re-create.
//!
//! Operation counters ([`StoreStats`]) make remote traffic observable.
//! [`MemoryStore::set_read_only`] simulates a store that denies writes and
//! [`MemoryStore::set_unavailable`] one that cannot be reached at all.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    CollectionWatch, Delta, DocumentWatch, Fields, Query, RemoteStore, StoredDocument,
    MAX_BATCH_SIZE,
};
use crate::error::{StoreError, StoreResult};
use crate::model::{CollectionName, DocumentId};

/// Counters of the operations a store has served
#[derive(Debug, Default)]
pub struct StoreStats {
    reads: AtomicU64,
    batch_reads: AtomicU64,
    writes: AtomicU64,
    increments: AtomicU64,
    deletes: AtomicU64,
    queries: AtomicU64,
    watches: AtomicU64,
}

/// Point-in-time copy of [`StoreStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub reads: u64,
    pub batch_reads: u64,
    pub writes: u64,
    pub increments: u64,
    pub deletes: u64,
    pub queries: u64,
    pub watches: u64,
}

impl StoreStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            batch_reads: self.batch_reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            increments: self.increments.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            watches: self.watches.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.reads,
            &self.batch_reads,
            &self.writes,
            &self.increments,
            &self.deletes,
            &self.queries,
            &self.watches,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Entry {
    pub(super) version: u64,
    pub(super) fields: Fields,
}

/// Serializable contents of a store
#[derive(Debug, Default, Serialize, Deserialize)]
pub(super) struct Contents {
    pub(super) next_version: u64,
    pub(super) collections: HashMap<CollectionName, BTreeMap<DocumentId, Entry>>,
}

struct DocumentWatcher {
    collection: CollectionName,
    id: DocumentId,
    tx: mpsc::UnboundedSender<Option<StoredDocument>>,
}

struct CollectionWatcher {
    collection: CollectionName,
    tx: mpsc::UnboundedSender<Vec<StoredDocument>>,
}

#[derive(Default)]
struct State {
    contents: Contents,
    document_watchers: Vec<DocumentWatcher>,
    collection_watchers: Vec<CollectionWatcher>,
}

impl State {
    fn stored(&self, collection: &str, id: &str) -> Option<StoredDocument> {
        let entry = self.contents.collections.get(collection)?.get(id)?;
        Some(StoredDocument {
            id: id.to_string(),
            fields: entry.fields.clone(),
            version: entry.version,
        })
    }

    fn members(&self, collection: &str) -> Vec<StoredDocument> {
        self.contents
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, entry)| StoredDocument {
                        id: id.clone(),
                        fields: entry.fields.clone(),
                        version: entry.version,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn entry_mut(&mut self, collection: &str, id: &str) -> StoreResult<&mut Entry> {
        self.contents
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    fn next_version(&mut self) -> u64 {
        self.contents.next_version += 1;
        self.contents.next_version
    }

    /// Push the new state of `collection/id` to every live watcher
    fn notify(&mut self, collection: &str, id: &str) {
        let document = self.stored(collection, id);
        self.document_watchers.retain(|w| {
            if w.collection != collection || w.id != id {
                return !w.tx.is_closed();
            }
            w.tx.send(document.clone()).is_ok()
        });

        if self
            .collection_watchers
            .iter()
            .any(|w| w.collection == collection)
        {
            let members = self.members(collection);
            self.collection_watchers.retain(|w| {
                if w.collection != collection {
                    return !w.tx.is_closed();
                }
                w.tx.send(members.clone()).is_ok()
            });
        }
    }
}

/// Thread-safe in-memory [`RemoteStore`]
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    stats: StoreStats,
    read_only: AtomicBool,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn from_contents(contents: Contents) -> Self {
        Self {
            state: Mutex::new(State {
                contents,
                ..State::default()
            }),
            ..Self::default()
        }
    }

    pub(super) fn with_contents<R>(&self, f: impl FnOnce(&Contents) -> R) -> R {
        f(&self.state.lock().contents)
    }

    /// Operation counters
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Deny (or allow again) every mutating operation
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Fail every operation (or stop failing) as if the store were offline
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of documents in a collection
    pub fn document_count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .contents
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Names of the non-empty collections, sorted
    pub fn collection_names(&self) -> Vec<CollectionName> {
        let state = self.state.lock();
        let mut names: Vec<_> = state
            .contents
            .collections
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of subscriptions still attached
    pub fn active_watches(&self) -> usize {
        let mut state = self.state.lock();
        state.document_watchers.retain(|w| !w.tx.is_closed());
        state.collection_watchers.retain(|w| !w.tx.is_closed());
        state.document_watchers.len() + state.collection_watchers.len()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("deadline exceeded".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self, collection: &str) -> StoreResult<()> {
        self.check_available()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::PermissionDenied {
                collection: collection.to_string(),
                reason: "store is read-only".to_string(),
            });
        }
        Ok(())
    }

    fn merge(&self, collection: &str, id: &str, expected: Option<u64>, fields: Fields) -> StoreResult<()> {
        self.check_writable(collection)?;

        let mut state = self.state.lock();
        let actual = state.entry_mut(collection, id)?.version;
        if let Some(expected) = expected {
            if actual != expected {
                return Err(StoreError::Conflict {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    expected,
                    actual,
                });
            }
        }

        // Only applied updates count as writes
        StoreStats::bump(&self.stats.writes);
        let version = state.next_version();
        let entry = state.entry_mut(collection, id)?;
        entry.fields.extend(fields);
        entry.version = version;
        state.notify(collection, id);
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>> {
        self.check_available()?;
        StoreStats::bump(&self.stats.reads);
        Ok(self.state.lock().stored(collection, id))
    }

    async fn get_where_id_in(
        &self,
        collection: &str,
        ids: &[DocumentId],
    ) -> StoreResult<Vec<StoredDocument>> {
        self.check_available()?;
        if ids.len() > MAX_BATCH_SIZE {
            return Err(StoreError::InvalidArgument(format!(
                "'in' accepts at most {} ids, got {}",
                MAX_BATCH_SIZE,
                ids.len()
            )));
        }
        StoreStats::bump(&self.stats.batch_reads);
        debug!(collection, count = ids.len(), "batched read");

        let state = self.state.lock();
        Ok(state
            .members(collection)
            .into_iter()
            .filter(|doc| ids.contains(&doc.id))
            .collect())
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.check_writable(collection)?;
        StoreStats::bump(&self.stats.writes);

        let mut state = self.state.lock();
        let version = state.next_version();
        state
            .contents
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), Entry { version, fields });
        state.notify(collection, id);
        Ok(())
    }

    async fn create(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<bool> {
        self.check_writable(collection)?;

        let mut state = self.state.lock();
        if state.stored(collection, id).is_some() {
            return Ok(false);
        }

        StoreStats::bump(&self.stats.writes);
        let version = state.next_version();
        state
            .contents
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), Entry { version, fields });
        state.notify(collection, id);
        Ok(true)
    }

    async fn update_fields(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.merge(collection, id, None, fields)
    }

    async fn update_fields_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        fields: Fields,
    ) -> StoreResult<()> {
        self.merge(collection, id, Some(expected_version), fields)
    }

    async fn increment_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: Delta,
    ) -> StoreResult<Value> {
        self.check_writable(collection)?;

        let mut state = self.state.lock();
        let current = state
            .entry_mut(collection, id)?
            .fields
            .get(field)
            .cloned()
            .unwrap_or(Value::from(0));
        let updated = add(&current, delta).ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "field '{}' of [{}/{}] is not numeric",
                field, collection, id
            ))
        })?;

        StoreStats::bump(&self.stats.increments);
        let version = state.next_version();
        let entry = state.entry_mut(collection, id)?;
        entry.fields.insert(field.to_string(), updated.clone());
        entry.version = version;
        state.notify(collection, id);
        Ok(updated)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.check_writable(collection)?;
        StoreStats::bump(&self.stats.deletes);

        let mut state = self.state.lock();
        let removed = state
            .contents
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            state.next_version();
            state.notify(collection, id);
        }
        Ok(())
    }

    async fn watch_document(&self, collection: &str, id: &str) -> StoreResult<DocumentWatch> {
        self.check_available()?;
        StoreStats::bump(&self.stats.watches);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock();
        // Receiver is still held here, so the initial send cannot fail
        let _ = tx.send(state.stored(collection, id));
        state.document_watchers.push(DocumentWatcher {
            collection: collection.to_string(),
            id: id.to_string(),
            tx,
        });
        Ok(rx)
    }

    async fn watch_collection(&self, collection: &str) -> StoreResult<CollectionWatch> {
        self.check_available()?;
        StoreStats::bump(&self.stats.watches);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock();
        let _ = tx.send(state.members(collection));
        state.collection_watchers.push(CollectionWatcher {
            collection: collection.to_string(),
            tx,
        });
        Ok(rx)
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<StoredDocument>> {
        self.check_available()?;
        StoreStats::bump(&self.stats.queries);
        let members = self.state.lock().members(collection);
        query.apply(members)
    }
}

/// Add a delta to a JSON number, keeping integers integral where possible
fn add(current: &Value, delta: Delta) -> Option<Value> {
    let Value::Number(n) = current else {
        return None;
    };
    match delta {
        Delta::Int(d) => {
            if let Some(i) = n.as_i64() {
                Some(Value::from(i.checked_add(d)?))
            } else if let Some(u) = n.as_u64() {
                let sum = i128::from(u) + i128::from(d);
                u64::try_from(sum)
                    .map(Value::from)
                    .ok()
                    .or_else(|| i64::try_from(sum).ok().map(Value::from))
            } else {
                Number::from_f64(n.as_f64()? + d as f64).map(Value::Number)
            }
        }
        Delta::Float(d) => Number::from_f64(n.as_f64()? + d).map(Value::Number),
    }
}
