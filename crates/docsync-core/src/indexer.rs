//! Sequential indexes for documents
//!
//! An [`Indexed`] document receives a per-type index the first time it is
//! written with [`Repository::write_and_index`]. The first document of a
//! type gets index 0, the next 1, and so on. The counters live in the
//! `_indexCount` document of the unique collection, one field per
//! collection name, and are advanced with the store's atomic increment so
//! concurrent writers never receive the same index.

use serde_json::Value;
use tracing::{debug, error, info};

use crate::context::Repository;
use crate::error::{StoreError, SyncResult};
use crate::model::Document;
use crate::store::{Delta, Fields};
use crate::unique::UNIQUE_COLLECTION;

/// Id of the unique document holding every collection's index counter
pub const INDEX_COUNT_ID: &str = "_indexCount";

/// A document numbered in creation order within its collection
pub trait Indexed: Document {
    /// The assigned index, `None` until the document is first indexed
    fn index(&self) -> Option<i64>;

    fn set_index(&mut self, index: i64);
}

impl<D: Indexed> Repository<D> {
    /// Assign the next index of the collection if the document has none,
    /// then write it
    ///
    /// A document that already has an index keeps it. When the write fails
    /// after an index was taken, the index stays assigned locally and the
    /// counter is not rolled back.
    pub async fn write_and_index(&self, document: &mut D) -> SyncResult<()> {
        if let Some(index) = document.index() {
            debug!(
                "[{}/{}] already has index {}",
                self.collection(),
                document.id(),
                index
            );
            return self.write(&*document).await;
        }

        let index = self.next_index().await?;
        document.set_index(index);
        info!(
            "Assigned index {} to [{}/{}]",
            index,
            self.collection(),
            document.id()
        );
        self.write(&*document).await
    }

    async fn next_index(&self) -> SyncResult<i64> {
        let counted = match self.bump_counter().await {
            Err(StoreError::NotFound { .. }) => {
                let created = self
                    .store()
                    .create(UNIQUE_COLLECTION, INDEX_COUNT_ID, Fields::new())
                    .await
                    .inspect_err(|e| error!("Creating index counters failed: {}", e))?;
                if created {
                    debug!("Created index counters");
                }
                self.bump_counter().await
            }
            other => other,
        }
        .inspect_err(|e| error!("Index counter of [{}] failed: {}", self.collection(), e))?;

        // The counter holds how many indexes were handed out
        match counted.as_i64() {
            Some(count) => Ok(count - 1),
            None => Err(StoreError::InvalidArgument(format!(
                "index counter of [{}] is not an integer: {}",
                self.collection(),
                counted
            ))
            .into()),
        }
    }

    async fn bump_counter(&self) -> Result<Value, StoreError> {
        self.store()
            .increment_field(
                UNIQUE_COLLECTION,
                INDEX_COUNT_ID,
                self.collection(),
                Delta::Int(1),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::model::{new_document_id, DocumentId};
    use crate::store::RemoteStore;
    use crate::testing::context;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Ticket {
        id: DocumentId,
        created_at: DateTime<Utc>,
        summary: String,
        index: Option<i64>,
    }

    impl Ticket {
        fn new(summary: &str) -> Self {
            Self {
                id: new_document_id(),
                created_at: Utc::now(),
                summary: summary.to_string(),
                index: None,
            }
        }
    }

    impl Document for Ticket {
        fn id(&self) -> &str {
            &self.id
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
    }

    impl Indexed for Ticket {
        fn index(&self) -> Option<i64> {
            self.index
        }

        fn set_index(&mut self, index: i64) {
            self.index = Some(index);
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Invoice {
        id: DocumentId,
        created_at: DateTime<Utc>,
        index: Option<i64>,
    }

    impl Document for Invoice {
        fn id(&self) -> &str {
            &self.id
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
    }

    impl Indexed for Invoice {
        fn index(&self) -> Option<i64> {
            self.index
        }

        fn set_index(&mut self, index: i64) {
            self.index = Some(index);
        }
    }

    #[tokio::test]
    async fn test_sequential_indexes_start_at_zero() {
        let (ctx, store) = context();
        let tickets = ctx.repository::<Ticket>();

        let mut assigned = Vec::new();
        for summary in ["First", "Second", "Third"] {
            let mut ticket = Ticket::new(summary);
            tickets.write_and_index(&mut ticket).await.unwrap();
            assigned.push(ticket.index);

            let stored = tickets.fetch(&ticket.id, false).await.unwrap().unwrap();
            assert_eq!(stored.index, ticket.index);
        }

        assert_eq!(assigned, vec![Some(0), Some(1), Some(2)]);
        let counters = store
            .get(UNIQUE_COLLECTION, INDEX_COUNT_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counters.fields["Ticket"], 3);
    }

    #[tokio::test]
    async fn test_indexed_document_keeps_its_index() {
        let (ctx, store) = context();
        let tickets = ctx.repository::<Ticket>();
        let mut ticket = Ticket::new("Once");
        tickets.write_and_index(&mut ticket).await.unwrap();

        ticket.summary = "Edited".to_string();
        tickets.write_and_index(&mut ticket).await.unwrap();

        assert_eq!(ticket.index, Some(0));
        let stored = tickets.fetch(&ticket.id, false).await.unwrap().unwrap();
        assert_eq!(stored.summary, "Edited");
        assert_eq!(store.stats().snapshot().increments, 1);
    }

    #[tokio::test]
    async fn test_collections_count_separately() {
        let (ctx, _store) = context();
        let mut ticket = Ticket::new("Ticket");
        let mut invoice = Invoice {
            id: new_document_id(),
            created_at: Utc::now(),
            index: None,
        };

        ctx.repository::<Ticket>()
            .write_and_index(&mut ticket)
            .await
            .unwrap();
        ctx.repository::<Invoice>()
            .write_and_index(&mut invoice)
            .await
            .unwrap();

        assert_eq!(ticket.index, Some(0));
        assert_eq!(invoice.index, Some(0));
    }

    #[tokio::test]
    async fn test_concurrent_indexing_hands_out_distinct_indexes() {
        let (ctx, _store) = context();
        let tickets = ctx.repository::<Ticket>();

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let tickets = tickets.clone();
                tokio::spawn(async move {
                    let mut ticket = Ticket::new(&format!("Ticket {}", i));
                    tickets.write_and_index(&mut ticket).await.map(|_| ticket)
                })
            })
            .collect();

        let mut indexes = Vec::new();
        for task in tasks {
            let ticket = task.await.unwrap().unwrap();
            indexes.push(ticket.index.unwrap());
        }
        indexes.sort();

        assert_eq!(indexes, (0..20).collect::<Vec<i64>>());
        assert_eq!(tickets.fetch_all().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_counters_document_keeps_other_fields() {
        let (ctx, store) = context();
        let mut fields = Fields::new();
        fields.insert("Invoice".to_string(), json!(7));
        store
            .set(UNIQUE_COLLECTION, INDEX_COUNT_ID, fields)
            .await
            .unwrap();

        let mut ticket = Ticket::new("Next to invoices");
        ctx.repository::<Ticket>()
            .write_and_index(&mut ticket)
            .await
            .unwrap();

        let counters = store
            .get(UNIQUE_COLLECTION, INDEX_COUNT_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counters.fields["Invoice"], 7);
        assert_eq!(counters.fields["Ticket"], 1);
        assert_eq!(ticket.index, Some(0));
    }

    #[tokio::test]
    async fn test_failed_counter_leaves_document_unindexed() {
        let (ctx, store) = context();
        store.set_read_only(true);
        let mut ticket = Ticket::new("Denied");

        let err = ctx
            .repository::<Ticket>()
            .write_and_index(&mut ticket)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Store(StoreError::PermissionDenied { .. })));
        assert_eq!(ticket.index, None);
    }
}
