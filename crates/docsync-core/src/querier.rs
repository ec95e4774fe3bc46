//! Conditional queries
//!
//! A [`QueryBuilder`] collects `(field, comparator, value)` conditions and
//! runs them as one store query:
//!
//! ```ignore
//! let popular = ctx
//!     .repository::<Post>()
//!     .query()
//!     .filter(&Post::LIKES, Comparator::GreaterThan, 10)
//!     .order(Order::Descending)
//!     .limit(5)
//!     .fetch()
//!     .await?;
//! ```
//!
//! A builder without conditions fetches nothing. Use
//! [`Repository::fetch_all`] to read a whole collection.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::context::Repository;
use crate::error::{SyncError, SyncResult};
use crate::model::{decode, Document, FieldPath};
use crate::store::{Comparator, Condition, Order, Query, StoredDocument};

/// Builder for a conditional query over one collection
#[derive(Debug)]
pub struct QueryBuilder<D> {
    repository: Repository<D>,
    query: Query,
    invalid: Option<SyncError>,
}

impl<D: Document> Repository<D> {
    /// Start a conditional query on this collection
    pub fn query(&self) -> QueryBuilder<D> {
        QueryBuilder {
            repository: self.clone(),
            query: Query::default(),
            invalid: None,
        }
    }

    /// Read every document of the collection
    pub async fn fetch_all(&self) -> SyncResult<Vec<D>> {
        let stored = self
            .store()
            .query(self.collection(), &Query::default())
            .await
            .inspect_err(|e| error!("Read of [{}] failed: {}", self.collection(), e))?;
        Ok(self.decode_all(stored))
    }

    fn decode_all(&self, stored: Vec<StoredDocument>) -> Vec<D> {
        stored
            .into_iter()
            .filter_map(|entry| match decode::<D>(entry) {
                Ok(document) => {
                    self.cache().register(&document);
                    Some(document)
                }
                Err(e) => {
                    warn!("Skipping document: {}", e);
                    None
                }
            })
            .collect()
    }
}

impl<D: Document> QueryBuilder<D> {
    /// Add a condition on a field
    ///
    /// The value's type depends on the comparator: the field's own type for
    /// comparisons, an element for `ArrayContains`, and a list of at most
    /// ten candidates for `In`, `NotIn` and `ArrayContainsAny`.
    pub fn filter<V, T: Serialize>(
        mut self,
        field: &FieldPath<D, V>,
        comparator: Comparator,
        value: T,
    ) -> Self {
        if self.invalid.is_some() {
            return self;
        }

        match serde_json::to_value(value) {
            Ok(value) => {
                if comparator.requires_array() && !matches!(value, Value::Array(_)) {
                    self.invalid = Some(self.invalid_query(format!(
                        "'{}' on '{}' requires a list of values",
                        comparator,
                        field.name()
                    )));
                } else {
                    self.query
                        .conditions
                        .push(Condition::new(field.name(), comparator, value));
                }
            }
            Err(source) => {
                self.invalid = Some(SyncError::Encode {
                    collection: self.repository.collection().to_string(),
                    source,
                });
            }
        }
        self
    }

    /// Sort by the first condition's field
    pub fn order(mut self, order: Order) -> Self {
        self.query.order = Some(order);
        self
    }

    /// Return at most `limit` documents
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Run the query
    ///
    /// Documents that fail to decode are left out of the result.
    pub async fn fetch(self) -> SyncResult<Vec<D>> {
        if let Some(err) = self.invalid {
            error!("{}", err);
            return Err(err);
        }

        let collection = self.repository.collection();
        if self.query.conditions.is_empty() {
            debug!("Query on [{}] has no conditions, nothing to fetch", collection);
            return Ok(Vec::new());
        }

        let stored = self
            .repository
            .store()
            .query(collection, &self.query)
            .await
            .inspect_err(|e| error!("Query on [{}] failed: {}", collection, e))?;

        debug!("Query on [{}] matched {} document(s)", collection, stored.len());
        Ok(self.repository.decode_all(stored))
    }

    fn invalid_query(&self, reason: String) -> SyncError {
        SyncError::InvalidQuery {
            collection: self.repository.collection().to_string(),
            reason,
        }
    }
}
