//! Deleting documents
//!
//! Deletes never cascade: children listed in a deleted parent's reference
//! arrays stay in the store, and arrays in other documents that mention a
//! deleted id keep it until they are unrelated. Active listeners are left
//! running and observe the deletion.

use tracing::{error, info};

use crate::context::Repository;
use crate::error::SyncResult;
use crate::model::{Document, ReferenceField};

impl<D: Document> Repository<D> {
    /// Delete the document with this id
    ///
    /// Deleting a document that does not exist succeeds. The cached copy,
    /// if any, is evicted.
    pub async fn destroy(&self, id: &str) -> SyncResult<()> {
        self.store()
            .delete(self.collection(), id)
            .await
            .inspect_err(|e| error!("Delete of [{}/{}] failed: {}", self.collection(), id, e))?;

        self.cache().evict::<D>(id);
        info!("Document deleted from [{}]. ID: {}", self.collection(), id);
        Ok(())
    }

    pub async fn destroy_document(&self, document: &D) -> SyncResult<()> {
        self.destroy(document.id()).await
    }

    /// Remove the document from a parent's reference array, then delete it
    ///
    /// If unrelating fails nothing is deleted.
    pub async fn destroy_and_unlink<P: Document>(
        &self,
        document: &D,
        field: &ReferenceField<P>,
        parent: &mut P,
    ) -> SyncResult<()> {
        self.unrelate(document, field, parent).await?;
        self.destroy_document(document).await
    }
}
