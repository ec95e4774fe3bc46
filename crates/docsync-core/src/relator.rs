//! One-to-many relationships through parent reference arrays
//!
//! A parent document holds the ids of its children in a [`ReferenceField`].
//! Relating and unrelating read the parent's array fresh from the store,
//! edit it, and write the whole array back. The local parent is updated to
//! match once the write succeeds.
//!
//! Concurrent edits of the same array race. With [`RelateMode::Checked`]
//! the write back is a compare-and-swap on the parent's version and a lost
//! race is retried with a fresh read; with [`RelateMode::Unchecked`] the
//! last writer wins and the other edit is lost.

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::RelateMode;
use crate::context::{Repository, SyncContext};
use crate::error::{StoreError, SyncError, SyncResult};
use crate::model::{single_field, Document, DocumentId, ReferenceField};
use crate::store::RemoteStore;

impl<D: Document> Repository<D> {
    /// Add this document's id to the parent's reference array
    ///
    /// Relating an already related document leaves the array unchanged.
    pub async fn relate<P: Document>(
        &self,
        child: &D,
        field: &ReferenceField<P>,
        parent: &mut P,
    ) -> SyncResult<()> {
        let child_id = child.id();
        update_reference_array(self.context(), field, parent, |ids| {
            if !ids.iter().any(|id| id == child_id) {
                ids.push(child_id.to_string());
            }
        })
        .await?;

        info!(
            "Related [{}/{}] to [{}/{}] through '{}'",
            self.collection(),
            child_id,
            P::collection(),
            parent.id(),
            field.name()
        );
        Ok(())
    }

    /// Remove every occurrence of this document's id from the parent's array
    pub async fn unrelate<P: Document>(
        &self,
        child: &D,
        field: &ReferenceField<P>,
        parent: &mut P,
    ) -> SyncResult<()> {
        let child_id = child.id();
        update_reference_array(self.context(), field, parent, |ids| {
            ids.retain(|id| id != child_id);
        })
        .await?;

        info!(
            "Unrelated [{}/{}] from [{}/{}] through '{}'",
            self.collection(),
            child_id,
            P::collection(),
            parent.id(),
            field.name()
        );
        Ok(())
    }
}

/// Read a parent's reference array and the version it was read at
///
/// `None` when the parent does not exist or has no (or a null) array.
pub(crate) async fn read_reference_array<P: Document>(
    store: &dyn RemoteStore,
    field: &ReferenceField<P>,
    parent_id: &str,
) -> SyncResult<Option<(Vec<DocumentId>, u64)>> {
    let collection = P::collection();
    let stored = store
        .get(&collection, parent_id)
        .await
        .inspect_err(|e| error!("Read of [{}/{}] failed: {}", collection, parent_id, e))?;

    let Some(stored) = stored else {
        return Ok(None);
    };

    let items = match stored.fields.get(field.name()) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(not_an_array(&collection, parent_id, field)),
    };

    let ids = items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| not_an_array(&collection, parent_id, field))?;

    Ok(Some((ids, stored.version)))
}

fn not_an_array<P>(collection: &str, id: &str, field: &ReferenceField<P>) -> SyncError {
    SyncError::NotAnArray {
        collection: collection.to_string(),
        id: id.to_string(),
        field: field.name(),
    }
}

async fn update_reference_array<P: Document>(
    ctx: &SyncContext,
    field: &ReferenceField<P>,
    parent: &mut P,
    edit: impl Fn(&mut Vec<DocumentId>),
) -> SyncResult<()> {
    let collection = P::collection();
    let parent_id = parent.id().to_string();
    let mode = ctx.config().relate_mode;
    let max_attempts = ctx.config().max_relate_attempts.max(1);

    let mut attempt = 0;
    loop {
        attempt += 1;

        let Some((mut ids, version)) = read_reference_array(ctx.store(), field, &parent_id).await?
        else {
            let err = SyncError::NoParentArray {
                collection,
                id: parent_id,
                field: field.name(),
            };
            error!("{}", err);
            return Err(err);
        };

        edit(&mut ids);
        let fields = single_field(field.name(), Value::from(ids.clone()));

        let result = match mode {
            RelateMode::Checked => {
                ctx.store()
                    .update_fields_if_version(&collection, &parent_id, version, fields)
                    .await
            }
            RelateMode::Unchecked => {
                ctx.store()
                    .update_fields(&collection, &parent_id, fields)
                    .await
            }
        };

        match result {
            Ok(()) => {
                debug!(
                    "'{}' of [{}/{}] now holds {} id(s)",
                    field.name(),
                    collection,
                    parent_id,
                    ids.len()
                );
                field.set(parent, ids);
                ctx.cache().register(&*parent);
                return Ok(());
            }
            Err(StoreError::Conflict { .. }) if attempt < max_attempts => {
                warn!(
                    "'{}' of [{}/{}] changed concurrently, retrying ({}/{})",
                    field.name(),
                    collection,
                    parent_id,
                    attempt,
                    max_attempts
                );
            }
            Err(StoreError::Conflict { .. }) => {
                let err = SyncError::RelateConflict {
                    collection,
                    id: parent_id,
                    field: field.name(),
                    attempts: attempt,
                };
                error!("{}", err);
                return Err(err);
            }
            Err(e) => {
                error!(
                    "Update of '{}' on [{}/{}] failed: {}",
                    field.name(),
                    collection,
                    parent_id,
                    e
                );
                return Err(e.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Barrier;

    use crate::config::RelateMode;
    use crate::context::SyncContext;
    use crate::error::{StoreError, StoreResult, SyncError};
    use crate::model::DocumentId;
    use crate::store::{
        CollectionWatch, Delta, DocumentWatch, Fields, MemoryStore, Query, RemoteStore,
        StoredDocument,
    };
    use crate::testing::{config_with_mode, context, context_with, Post, User};

    /// Holds the first two reads of a collection until both have happened,
    /// so two relates are guaranteed to start from the same parent version.
    struct LockstepStore {
        inner: MemoryStore,
        collection: &'static str,
        reads: AtomicUsize,
        barrier: Barrier,
    }

    impl LockstepStore {
        fn new(collection: &'static str) -> Self {
            Self {
                inner: MemoryStore::new(),
                collection,
                reads: AtomicUsize::new(0),
                barrier: Barrier::new(2),
            }
        }
    }

    #[async_trait]
    impl RemoteStore for LockstepStore {
        async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>> {
            let result = self.inner.get(collection, id).await;
            if collection == self.collection && self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
                self.barrier.wait().await;
            }
            result
        }

        async fn get_where_id_in(
            &self,
            collection: &str,
            ids: &[DocumentId],
        ) -> StoreResult<Vec<StoredDocument>> {
            self.inner.get_where_id_in(collection, ids).await
        }

        async fn set(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
            self.inner.set(collection, id, fields).await
        }

        async fn create(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<bool> {
            self.inner.create(collection, id, fields).await
        }

        async fn update_fields(
            &self,
            collection: &str,
            id: &str,
            fields: Fields,
        ) -> StoreResult<()> {
            self.inner.update_fields(collection, id, fields).await
        }

        async fn update_fields_if_version(
            &self,
            collection: &str,
            id: &str,
            expected_version: u64,
            fields: Fields,
        ) -> StoreResult<()> {
            self.inner
                .update_fields_if_version(collection, id, expected_version, fields)
                .await
        }

        async fn increment_field(
            &self,
            collection: &str,
            id: &str,
            field: &str,
            delta: Delta,
        ) -> StoreResult<Value> {
            self.inner.increment_field(collection, id, field, delta).await
        }

        async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
            self.inner.delete(collection, id).await
        }

        async fn watch_document(&self, collection: &str, id: &str) -> StoreResult<DocumentWatch> {
            self.inner.watch_document(collection, id).await
        }

        async fn watch_collection(&self, collection: &str) -> StoreResult<CollectionWatch> {
            self.inner.watch_collection(collection).await
        }

        async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<StoredDocument>> {
            self.inner.query(collection, query).await
        }
    }

    /// Two relates of different posts to one author, started in lockstep
    async fn race_two_relates(
        mode: RelateMode,
        max_relate_attempts: u32,
    ) -> (Vec<crate::SyncResult<()>>, Vec<DocumentId>) {
        let store = Arc::new(LockstepStore::new("User"));
        let config = crate::Config {
            max_relate_attempts,
            ..config_with_mode(mode)
        };
        let ctx = SyncContext::new(store.clone(), config);
        let users = ctx.repository::<User>();
        let posts = ctx.repository::<Post>();

        let author = User::new("Ada");
        users.write(&author).await.unwrap();
        let first = Post::new(&author.id, "First");
        let second = Post::new(&author.id, "Second");

        let mut copy_a = author.clone();
        let mut copy_b = author.clone();
        let (a, b) = tokio::join!(
            posts.relate(&first, &User::POST_IDS, &mut copy_a),
            posts.relate(&second, &User::POST_IDS, &mut copy_b),
        );

        let stored = store.inner.get("User", &author.id).await.unwrap().unwrap();
        let ids = serde_json::from_value(stored.fields["postIds"].clone()).unwrap();
        (vec![a, b], ids)
    }

    #[tokio::test]
    async fn test_unchecked_concurrent_relates_lose_an_update() {
        let (results, ids) = race_two_relates(RelateMode::Unchecked, 5).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn test_checked_concurrent_relates_keep_both() {
        let (results, ids) = race_two_relates(RelateMode::Checked, 5).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_checked_relate_gives_up_after_max_attempts() {
        let (results, ids) = race_two_relates(RelateMode::Checked, 1).await;

        let conflicts: Vec<_> = results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .collect();
        assert_eq!(conflicts.len(), 1);
        assert!(matches!(
            conflicts[0],
            SyncError::RelateConflict { attempts: 1, .. }
        ));
        assert_eq!(ids.len(), 1);
    }

    async fn written_author(ctx: &SyncContext) -> User {
        let author = User::new("Ada");
        ctx.repository::<User>().write(&author).await.unwrap();
        author
    }

    #[tokio::test]
    async fn test_relate_is_idempotent() {
        let (ctx, _store) = context();
        let posts = ctx.repository::<Post>();
        let mut author = written_author(&ctx).await;
        let post = Post::new(&author.id, "Once");

        posts.relate(&post, &User::POST_IDS, &mut author).await.unwrap();
        posts.relate(&post, &User::POST_IDS, &mut author).await.unwrap();

        assert_eq!(author.post_ids, vec![post.id.clone()]);
        let remote = ctx
            .repository::<User>()
            .fetch(&author.id, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(remote.post_ids, vec![post.id]);
    }

    #[tokio::test]
    async fn test_unrelate_reverses_relate() {
        let (ctx, _store) = context();
        let posts = ctx.repository::<Post>();
        let mut author = written_author(&ctx).await;
        let keep = Post::new(&author.id, "Keep");
        let dropped = Post::new(&author.id, "Drop");

        posts.relate(&keep, &User::POST_IDS, &mut author).await.unwrap();
        let before = author.post_ids.clone();

        posts.relate(&dropped, &User::POST_IDS, &mut author).await.unwrap();
        posts.unrelate(&dropped, &User::POST_IDS, &mut author).await.unwrap();

        assert_eq!(author.post_ids, before);
    }

    #[tokio::test]
    async fn test_unrelate_removes_every_occurrence() {
        let (ctx, store) = context();
        let mut author = written_author(&ctx).await;
        let post = Post::with_id("dup", &author.id, "Dup");

        let mut fields = Fields::new();
        fields.insert("postIds".to_string(), json!(["dup", "other", "dup"]));
        store.update_fields("User", &author.id, fields).await.unwrap();

        ctx.repository::<Post>()
            .unrelate(&post, &User::POST_IDS, &mut author)
            .await
            .unwrap();
        assert_eq!(author.post_ids, vec!["other".to_string()]);
    }

    #[tokio::test]
    async fn test_relate_refreshes_stale_local_parent() {
        let (ctx, store) = context();
        let posts = ctx.repository::<Post>();
        let mut author = written_author(&ctx).await;

        // Another client related a post meanwhile
        let mut fields = Fields::new();
        fields.insert("postIds".to_string(), json!(["elsewhere"]));
        store.update_fields("User", &author.id, fields).await.unwrap();

        let post = Post::new(&author.id, "Here");
        posts.relate(&post, &User::POST_IDS, &mut author).await.unwrap();

        assert_eq!(author.post_ids, vec!["elsewhere".to_string(), post.id]);
    }

    #[tokio::test]
    async fn test_relate_missing_array() {
        let (ctx, store) = context();
        let posts = ctx.repository::<Post>();
        let mut author = User::new("Ada");
        let post = Post::new(&author.id, "Nowhere");

        // No remote parent at all
        let err = posts
            .relate(&post, &User::POST_IDS, &mut author)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NoParentArray { field: "postIds", .. }));

        // Parent without the field
        let mut fields = Fields::new();
        fields.insert("displayName".to_string(), json!("Ada"));
        store.set("User", &author.id, fields).await.unwrap();
        let err = posts
            .relate(&post, &User::POST_IDS, &mut author)
            .await
            .unwrap_err();
        assert!(err.is_structural());

        // Explicit null
        let mut fields = Fields::new();
        fields.insert("postIds".to_string(), json!(null));
        store.update_fields("User", &author.id, fields).await.unwrap();
        let err = posts
            .unrelate(&post, &User::POST_IDS, &mut author)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NoParentArray { .. }));
        assert!(author.post_ids.is_empty());
    }

    #[tokio::test]
    async fn test_relate_wrong_type() {
        let (ctx, store) = context();
        let mut author = written_author(&ctx).await;
        let post = Post::new(&author.id, "Typed");

        for bad in [json!("p1"), json!([1, 2])] {
            let mut fields = Fields::new();
            fields.insert("postIds".to_string(), bad);
            store.update_fields("User", &author.id, fields).await.unwrap();

            let err = ctx
                .repository::<Post>()
                .relate(&post, &User::POST_IDS, &mut author)
                .await
                .unwrap_err();
            assert!(matches!(err, SyncError::NotAnArray { .. }));
        }
    }

    #[tokio::test]
    async fn test_relate_write_failure_leaves_local_parent() {
        let (ctx, store) = context_with(config_with_mode(RelateMode::Unchecked));
        let mut author = written_author(&ctx).await;
        store.set_read_only(true);

        let post = Post::new(&author.id, "Denied");
        let err = ctx
            .repository::<Post>()
            .relate(&post, &User::POST_IDS, &mut author)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Store(StoreError::PermissionDenied { .. })));
        assert!(author.post_ids.is_empty());
    }
}
