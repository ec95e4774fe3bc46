//! docsync core library
//!
//! A typed synchronization layer between application entities and a remote
//! document store. Entities implement [`Document`]; each type lives in its
//! own collection, named after the type.
//!
//! # Architecture
//!
//! - **RemoteStore**: the minimal store contract (reads, batched reads,
//!   writes, increments, deletes, watches, queries). [`MemoryStore`]
//!   implements it in-process.
//! - **SyncContext**: owns the store handle, the local cache, the listener
//!   registry and the configuration. Typed operations are reached through
//!   [`SyncContext::repository`].
//! - **LocalCache**: last known copy of each document, consulted by fetches
//!   that ask for it and refreshed by every successful read or write.
//!
//! One-to-many relationships are kept as arrays of child ids on the parent
//! (see [`ReferenceField`]). Deletes never cascade.
//!
//! # Quick Start
//!
//! ```text
//! let ctx = SyncContext::new(Arc::new(MemoryStore::new()), Config::default());
//! let users = ctx.repository::<User>();
//! let posts = ctx.repository::<Post>();
//!
//! let mut author = User::new("Ada");
//! users.write(&author).await?;
//!
//! let post = Post::new(&author.id, "Notes on engines");
//! posts.write_and_relate(&post, &User::POST_IDS, &mut author).await?;
//! posts.increment(&mut post, &Post::LIKES, 1).await?;
//!
//! let mut updates = posts.listen_to_document(&post.id, "screen").await?;
//! ```
//!
//! # Modules
//!
//! - `model`: the `Document` trait, ids, collection naming and field paths
//! - `store`: the `RemoteStore` contract and the in-memory store
//! - `context`: `SyncContext` and `Repository`
//! - `writer`, `fetcher`, `relator`, `destroyer`, `counter`, `querier`:
//!   typed operations on a repository
//! - `listener`: live subscriptions
//! - `unique`: named singleton documents
//! - `indexer`: per-collection sequential indexes
//! - `cache`: the local cache
//! - `config`: configuration
//! - `error`: error types

pub mod cache;
pub mod config;
pub mod context;
pub mod counter;
pub mod destroyer;
pub mod error;
pub mod fetcher;
pub mod indexer;
pub mod listener;
pub mod model;
pub mod querier;
pub mod relator;
pub mod store;
pub mod unique;
pub mod writer;

#[cfg(test)]
mod testing;

pub use cache::LocalCache;
pub use config::{Config, RelateMode};
pub use context::{Repository, SyncContext};
pub use counter::Incrementable;
pub use error::{StoreError, StoreResult, SyncError, SyncResult};
pub use indexer::{Indexed, INDEX_COUNT_ID};
pub use listener::{ListenerKey, ListenerRegistry, Updates};
pub use model::{
    collection_name, new_document_id, CollectionName, Document, DocumentId, FieldPath,
    ReferenceField,
};
pub use querier::QueryBuilder;
pub use store::{
    Comparator, Condition, Delta, MemoryStore, Order, Query, RemoteStore, StoredDocument,
    MAX_BATCH_SIZE,
};
pub use unique::UNIQUE_COLLECTION;
