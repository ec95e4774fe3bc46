//! Synchronization context
//!
//! The [`SyncContext`] owns everything the layer shares between operations:
//! the remote store handle, the [`LocalCache`], the [`ListenerRegistry`] and
//! the [`Config`]. Applications construct one and pass it around; tests
//! build one per test so nothing leaks between them.
//!
//! Typed operations live on [`Repository<D>`], obtained with
//! [`SyncContext::repository`]. The writer, fetcher, relator, destroyer,
//! counter, listener and querier modules each add their operations to it.
//!
//! ```ignore
//! let ctx = SyncContext::new(Arc::new(MemoryStore::new()), Config::default());
//! let posts = ctx.repository::<Post>();
//!
//! posts.write_and_relate(&post, &User::POST_IDS, &mut author).await?;
//! let mine = posts.fetch_children(&User::POST_IDS, &author, true).await?;
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::cache::LocalCache;
use crate::config::Config;
use crate::listener::ListenerRegistry;
use crate::model::{CollectionName, Document};
use crate::store::RemoteStore;

struct Inner {
    store: Arc<dyn RemoteStore>,
    cache: Arc<LocalCache>,
    listeners: ListenerRegistry,
    config: Config,
}

/// Shared state of the synchronization layer
///
/// Cheap to clone; clones share the same cache and listener registry.
#[derive(Clone)]
pub struct SyncContext {
    inner: Arc<Inner>,
}

impl SyncContext {
    pub fn new(store: Arc<dyn RemoteStore>, config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                cache: Arc::new(LocalCache::new()),
                listeners: ListenerRegistry::new(),
                config,
            }),
        }
    }

    /// Typed operations for documents of type `D`
    pub fn repository<D: Document>(&self) -> Repository<D> {
        Repository {
            ctx: self.clone(),
            collection: D::collection(),
            _marker: PhantomData,
        }
    }

    pub fn store(&self) -> &dyn RemoteStore {
        self.inner.store.as_ref()
    }

    pub fn cache(&self) -> &LocalCache {
        &self.inner.cache
    }

    pub(crate) fn shared_cache(&self) -> Arc<LocalCache> {
        Arc::clone(&self.inner.cache)
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.inner.listeners
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Cancel every subscription registered under `key`
    pub fn stop(&self, key: &str) -> usize {
        self.inner.listeners.stop(key)
    }
}

impl fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("cached", &self.inner.cache.len())
            .field("listener_keys", &self.inner.listeners.keys())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Typed access to one collection
pub struct Repository<D> {
    ctx: SyncContext,
    collection: CollectionName,
    _marker: PhantomData<fn() -> D>,
}

impl<D: Document> Repository<D> {
    /// Name of the collection this repository reads and writes
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub(crate) fn store(&self) -> &dyn RemoteStore {
        self.ctx.store()
    }

    pub(crate) fn cache(&self) -> &LocalCache {
        self.ctx.cache()
    }
}

impl<D> Clone for Repository<D> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            collection: self.collection.clone(),
            _marker: PhantomData,
        }
    }
}

impl<D> fmt::Debug for Repository<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &self.collection)
            .finish()
    }
}
