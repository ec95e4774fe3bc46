//! Reading documents from the remote store
//!
//! Reads consult the local cache first when asked to. Id lists are read in
//! batches of at most [`Config::effective_batch_size`](crate::Config::effective_batch_size)
//! ids, which keeps every request under the store's "id in" cap.

use std::collections::HashSet;

use tracing::{debug, error, warn};

use crate::context::Repository;
use crate::error::SyncResult;
use crate::model::{decode, Document, DocumentId, FieldPath, ReferenceField};
use crate::relator::read_reference_array;

impl<D: Document> Repository<D> {
    /// Fetch one document by id
    ///
    /// With `use_cache`, a cached copy is returned without contacting the
    /// store. Remote results are written to the cache.
    pub async fn fetch(&self, id: &str, use_cache: bool) -> SyncResult<Option<D>> {
        if use_cache {
            if let Some(document) = self.cache().grab::<D>(id) {
                debug!("Cache hit for [{}/{}]", self.collection(), id);
                return Ok(Some(document));
            }
        }

        let stored = self
            .store()
            .get(self.collection(), id)
            .await
            .inspect_err(|e| error!("Fetch of [{}/{}] failed: {}", self.collection(), id, e))?;

        let Some(stored) = stored else {
            debug!("[{}/{}] does not exist", self.collection(), id);
            return Ok(None);
        };

        let document = decode::<D>(stored)
            .inspect_err(|e| error!("Fetch of [{}/{}] failed: {}", self.collection(), id, e))?;
        self.cache().register(&document);
        Ok(Some(document))
    }

    /// Fetch every document whose id is listed
    ///
    /// Ids are split into batches; within a batch, cached documents come
    /// first and the remainder is read with one "id in" request. Missing
    /// ids and documents that fail to decode are left out. Repeated ids are
    /// read once. The first remote error aborts the whole call.
    pub async fn fetch_many(&self, ids: &[DocumentId], use_cache: bool) -> SyncResult<Vec<D>> {
        let batch_size = self.context().config().effective_batch_size();
        let mut seen = HashSet::with_capacity(ids.len());
        let ids: Vec<DocumentId> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        let mut documents = Vec::with_capacity(ids.len());

        for batch in ids.chunks(batch_size) {
            self.fetch_batch(batch, use_cache, &mut documents).await?;
        }

        debug!(
            "Fetched {} of {} requested [{}] documents",
            documents.len(),
            ids.len(),
            self.collection()
        );
        Ok(documents)
    }

    async fn fetch_batch(
        &self,
        batch: &[DocumentId],
        use_cache: bool,
        documents: &mut Vec<D>,
    ) -> SyncResult<()> {
        let mut remaining = Vec::with_capacity(batch.len());
        for id in batch {
            match use_cache.then(|| self.cache().grab::<D>(id)).flatten() {
                Some(document) => documents.push(document),
                None => remaining.push(id.clone()),
            }
        }

        if remaining.is_empty() {
            debug!("Batch of {} served from cache", batch.len());
            return Ok(());
        }

        let stored = self
            .store()
            .get_where_id_in(self.collection(), &remaining)
            .await
            .inspect_err(|e| error!("Batch fetch from [{}] failed: {}", self.collection(), e))?;

        for entry in stored {
            match decode::<D>(entry) {
                Ok(document) => {
                    self.cache().register(&document);
                    documents.push(document);
                }
                Err(e) => warn!("Skipping document: {}", e),
            }
        }
        Ok(())
    }

    /// Fetch the documents a parent references through `field`
    ///
    /// The parent's array is read fresh from the store. A parent without
    /// the array (or without a remote copy) has no children.
    pub async fn fetch_children<P: Document>(
        &self,
        field: &ReferenceField<P>,
        parent: &P,
        use_cache: bool,
    ) -> SyncResult<Vec<D>> {
        let ids = read_reference_array(self.store(), field, parent.id()).await?;
        match ids {
            Some((ids, _)) => self.fetch_many(&ids, use_cache).await,
            None => {
                debug!(
                    "[{}/{}] has no '{}' array, no children",
                    P::collection(),
                    parent.id(),
                    field.name()
                );
                Ok(Vec::new())
            }
        }
    }

    /// Fetch a single field of a document, bypassing the cache
    pub async fn fetch_field<V: Clone>(
        &self,
        id: &str,
        field: &FieldPath<D, V>,
    ) -> SyncResult<Option<V>> {
        let document = self.fetch(id, false).await?;
        Ok(document.map(|document| field.get(&document).clone()))
    }
}
