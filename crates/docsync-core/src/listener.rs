//! Live subscriptions to documents and collections
//!
//! Each subscription is a background task that reads a store watch,
//! decodes every snapshot, refreshes the local cache and hands the result
//! to the caller. Subscriptions are registered under a caller-chosen key;
//! [`ListenerRegistry::stop`] cancels every subscription under a key.
//!
//! There are two ways to consume updates:
//!
//! - a callback, invoked on the subscription task
//!   ([`Repository::on_document`], [`Repository::on_collection`])
//! - an [`Updates`] stream ([`Repository::listen_to_document`],
//!   [`Repository::listen_to_collection`]), which ends once the
//!   subscription is stopped
//!
//! Every subscription delivers the current state first, then one update per
//! remote change. A deleted document is delivered as `None`.

use std::collections::HashMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::context::Repository;
use crate::error::SyncResult;
use crate::model::{decode, CollectionName, Document, DocumentId};

/// Caller-chosen name grouping subscriptions for cancellation
pub type ListenerKey = String;

struct Registration {
    collection: CollectionName,
    target: Option<DocumentId>,
    handle: AbortHandle,
}

/// The subscriptions of a context, grouped by key
///
/// Dropping the registry cancels every subscription it holds.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<ListenerKey, Vec<Registration>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, key: &str, registration: Registration) {
        debug!(
            "Listener '{}' attached to [{}/{}]",
            key,
            registration.collection,
            registration.target.as_deref().unwrap_or("*")
        );
        self.listeners
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(registration);
    }

    /// Cancel every subscription registered under `key`
    ///
    /// Returns how many subscriptions were cancelled; an unknown key is a
    /// no-op.
    pub fn stop(&self, key: &str) -> usize {
        let Some(registrations) = self.listeners.lock().remove(key) else {
            debug!("No listeners under '{}'", key);
            return 0;
        };

        for registration in &registrations {
            registration.handle.abort();
        }
        info!("Stopped {} listener(s) under '{}'", registrations.len(), key);
        registrations.len()
    }

    /// Cancel every subscription
    pub fn stop_all(&self) -> usize {
        let drained: Vec<_> = self.listeners.lock().drain().collect();
        let mut stopped = 0;
        for (_, registrations) in drained {
            for registration in &registrations {
                registration.handle.abort();
            }
            stopped += registrations.len();
        }
        stopped
    }

    /// Number of subscriptions registered under `key`
    pub fn count(&self, key: &str) -> usize {
        self.listeners.lock().get(key).map_or(0, Vec::len)
    }

    /// Keys with at least one subscription, sorted
    pub fn keys(&self) -> Vec<ListenerKey> {
        let mut keys: Vec<_> = self.listeners.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Drop for ListenerRegistry {
    fn drop(&mut self) {
        for registrations in self.listeners.get_mut().values() {
            for registration in registrations {
                registration.handle.abort();
            }
        }
    }
}

/// A stream of subscription updates
///
/// Yields `None` from [`Updates::next`] once the subscription is stopped.
#[derive(Debug)]
pub struct Updates<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Updates<T> {
    /// Wait for the next update
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take an update if one is already queued
    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Unpin for Updates<T> {}

impl<T> Stream for Updates<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

impl<D: Document> Repository<D> {
    /// Subscribe to one document, delivering updates to `callback`
    ///
    /// The callback runs on the subscription task and receives `None` when
    /// the document does not exist or is deleted. A snapshot that fails to
    /// decode is logged and skipped.
    pub async fn on_document<F>(&self, id: &str, key: &str, mut callback: F) -> SyncResult<()>
    where
        F: FnMut(Option<D>) + Send + 'static,
    {
        let mut watch = self
            .store()
            .watch_document(self.collection(), id)
            .await
            .inspect_err(|e| error!("Watch of [{}/{}] failed: {}", self.collection(), id, e))?;

        let cache = self.context().shared_cache();
        let collection = self.collection().to_string();
        let target = id.to_string();
        let task = tokio::spawn(async move {
            while let Some(snapshot) = watch.recv().await {
                match snapshot {
                    Some(stored) => match decode::<D>(stored) {
                        Ok(document) => {
                            cache.register(&document);
                            callback(Some(document));
                        }
                        Err(e) => warn!("Skipping update: {}", e),
                    },
                    None => {
                        debug!("[{}/{}] does not exist", collection, target);
                        cache.evict::<D>(&target);
                        callback(None);
                    }
                }
            }
            debug!("Watch of [{}/{}] ended", collection, target);
        });

        self.context().listeners().register(
            key,
            Registration {
                collection: self.collection().to_string(),
                target: Some(id.to_string()),
                handle: task.abort_handle(),
            },
        );
        Ok(())
    }

    /// Subscribe to the whole collection, delivering updates to `callback`
    ///
    /// Each update carries every decodable document of the collection.
    pub async fn on_collection<F>(&self, key: &str, mut callback: F) -> SyncResult<()>
    where
        F: FnMut(Vec<D>) + Send + 'static,
    {
        let mut watch = self
            .store()
            .watch_collection(self.collection())
            .await
            .inspect_err(|e| error!("Watch of [{}] failed: {}", self.collection(), e))?;

        let cache = self.context().shared_cache();
        let collection = self.collection().to_string();
        let task = tokio::spawn(async move {
            while let Some(snapshot) = watch.recv().await {
                let mut documents = Vec::with_capacity(snapshot.len());
                for stored in snapshot {
                    match decode::<D>(stored) {
                        Ok(document) => {
                            cache.register(&document);
                            documents.push(document);
                        }
                        Err(e) => warn!("Skipping document: {}", e),
                    }
                }
                callback(documents);
            }
            debug!("Watch of [{}] ended", collection);
        });

        self.context().listeners().register(
            key,
            Registration {
                collection: self.collection().to_string(),
                target: None,
                handle: task.abort_handle(),
            },
        );
        Ok(())
    }

    /// Subscribe to one document as a stream of updates
    pub async fn listen_to_document(&self, id: &str, key: &str) -> SyncResult<Updates<Option<D>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.on_document(id, key, move |update| {
            let _ = tx.send(update);
        })
        .await?;
        Ok(Updates { rx })
    }

    /// Subscribe to the whole collection as a stream of updates
    pub async fn listen_to_collection(&self, key: &str) -> SyncResult<Updates<Vec<D>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.on_collection(key, move |update| {
            let _ = tx.send(update);
        })
        .await?;
        Ok(Updates { rx })
    }
}
