//! Writing documents to the remote store
//!
//! Local copies are only changed after the remote store has accepted a
//! mutation, so a failed write never leaves the caller's value ahead of
//! the store. Successful writes refresh the local cache.

use serde::Serialize;
use tracing::{debug, error, info};

use crate::context::Repository;
use crate::error::SyncResult;
use crate::model::{encode, encode_value, single_field, Document, FieldPath, ReferenceField};

impl<D: Document> Repository<D> {
    /// Create or fully overwrite a document
    pub async fn write(&self, document: &D) -> SyncResult<()> {
        let fields = encode(document)?;
        self.store()
            .set(self.collection(), document.id(), fields)
            .await
            .inspect_err(|e| {
                error!("Write of [{}/{}] failed: {}", self.collection(), document.id(), e)
            })?;

        self.cache().register(document);
        info!("Document written to [{}]. ID: {}", self.collection(), document.id());
        Ok(())
    }

    /// Set one field remotely, then on the local copy
    pub async fn write_field<V: Serialize>(
        &self,
        document: &mut D,
        field: &FieldPath<D, V>,
        value: V,
    ) -> SyncResult<()> {
        let encoded = encode_value::<D, V>(&value)?;
        self.store()
            .update_fields(self.collection(), document.id(), single_field(field.name(), encoded))
            .await
            .inspect_err(|e| {
                error!(
                    "Update of '{}' on [{}/{}] failed: {}",
                    field.name(),
                    self.collection(),
                    document.id(),
                    e
                )
            })?;

        field.set(document, value);
        self.cache().register(&*document);
        info!(
            "Field '{}' written on [{}/{}]",
            field.name(),
            self.collection(),
            document.id()
        );
        Ok(())
    }

    /// Push the local value of one field to the store
    pub async fn push_field<V: Serialize>(&self, document: &D, field: &FieldPath<D, V>) -> SyncResult<()> {
        let encoded = encode_value::<D, V>(field.get(document))?;
        self.store()
            .update_fields(self.collection(), document.id(), single_field(field.name(), encoded))
            .await
            .inspect_err(|e| {
                error!(
                    "Push of '{}' on [{}/{}] failed: {}",
                    field.name(),
                    self.collection(),
                    document.id(),
                    e
                )
            })?;

        self.cache().register(document);
        info!(
            "Field '{}' pushed on [{}/{}]",
            field.name(),
            self.collection(),
            document.id()
        );
        Ok(())
    }

    /// Write a document, then add its id to a parent's reference array
    ///
    /// The two steps are not atomic: if relating fails the document stays
    /// written and the error is returned.
    pub async fn write_and_relate<P: Document>(
        &self,
        document: &D,
        field: &ReferenceField<P>,
        parent: &mut P,
    ) -> SyncResult<()> {
        self.write(document).await?;
        self.relate(document, field, parent).await
    }

    /// Write a document only if no document exists under `check_id`
    ///
    /// `check_id` defaults to the document's own id. Returns whether the
    /// document was written.
    pub async fn safe_create(&self, document: &D, check_id: Option<&str>) -> SyncResult<bool> {
        let check_id = check_id.unwrap_or(document.id());
        let existing = self
            .store()
            .get(self.collection(), check_id)
            .await
            .inspect_err(|e| {
                error!("Existence check of [{}/{}] failed: {}", self.collection(), check_id, e)
            })?;

        if existing.is_some() {
            debug!(
                "[{}/{}] already exists, skipping create",
                self.collection(),
                check_id
            );
            return Ok(false);
        }

        self.write(document).await?;
        Ok(true)
    }
}
