//! Atomic numeric increments
//!
//! The store applies the delta server-side, so concurrent increments of the
//! same field never lose an update. The local copy is adjusted by the same
//! amount afterwards and may lag behind other clients' increments.
//!
//! An amount that would overflow the field's type on the local copy is
//! rejected before the store is touched.

use tracing::{error, info};

use crate::context::Repository;
use crate::error::{SyncError, SyncResult};
use crate::model::{Document, FieldPath};
use crate::store::Delta;

/// A numeric field type the store can increment
pub trait Incrementable: Copy + Send + Sync + 'static {
    /// The amount as the store's delta representation
    fn to_delta(self) -> Delta;

    /// `current + self`, or `None` if the result does not fit the type
    fn checked_add_to(self, current: Self) -> Option<Self>;
}

macro_rules! impl_incrementable_int {
    ($($t:ty),*) => {
        $(
            impl Incrementable for $t {
                fn to_delta(self) -> Delta {
                    Delta::Int(i64::from(self))
                }

                fn checked_add_to(self, current: Self) -> Option<Self> {
                    current.checked_add(self)
                }
            }
        )*
    };
}

macro_rules! impl_incrementable_float {
    ($($t:ty),*) => {
        $(
            impl Incrementable for $t {
                fn to_delta(self) -> Delta {
                    Delta::Float(f64::from(self))
                }

                fn checked_add_to(self, current: Self) -> Option<Self> {
                    Some(current + self)
                }
            }
        )*
    };
}

impl_incrementable_int!(i8, i16, i32, i64, u8, u16, u32);
impl_incrementable_float!(f32, f64);

impl<D: Document> Repository<D> {
    /// Atomically add `amount` to a numeric field
    ///
    /// A missing remote field counts as zero. On failure the local copy is
    /// left unchanged. Returns [`SyncError::Overflow`] without a remote call
    /// when the local result would not fit the field's type.
    pub async fn increment<N: Incrementable>(
        &self,
        document: &mut D,
        field: &FieldPath<D, N>,
        amount: N,
    ) -> SyncResult<()> {
        let updated = amount
            .checked_add_to(*field.get(document))
            .ok_or_else(|| SyncError::Overflow {
                collection: self.collection().to_string(),
                id: document.id().to_string(),
                field: field.name(),
            })?;

        self.store()
            .increment_field(self.collection(), document.id(), field.name(), amount.to_delta())
            .await
            .inspect_err(|e| {
                error!(
                    "Increment of '{}' on [{}/{}] failed: {}",
                    field.name(),
                    self.collection(),
                    document.id(),
                    e
                )
            })?;

        *field.get_mut(document) = updated;
        self.cache().register(&*document);
        info!(
            "Incremented '{}' on [{}/{}]",
            field.name(),
            self.collection(),
            document.id()
        );
        Ok(())
    }
}
