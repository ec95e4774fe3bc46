//! Error handling
//!
//! Two layers of errors:
//! - [`StoreError`]: failures reported by the remote store (timeouts,
//!   permission denial, missing documents, version conflicts)
//! - [`SyncError`]: failures of the synchronization layer itself, which wraps
//!   store errors unchanged and adds structural conditions such as a missing
//!   parent reference array or a document that cannot be decoded

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::{CollectionName, DocumentId};

/// Errors reported by a [`RemoteStore`](crate::store::RemoteStore)
#[derive(Error, Debug)]
pub enum StoreError {
    /// The addressed document does not exist
    #[error("Document [{collection}/{id}] not found")]
    NotFound {
        collection: CollectionName,
        id: DocumentId,
    },

    /// The store refused the operation
    #[error("Permission denied on [{collection}]: {reason}")]
    PermissionDenied {
        collection: CollectionName,
        reason: String,
    },

    /// The store could not be reached or timed out
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A conditional write found a different version than expected
    #[error("Version conflict on [{collection}/{id}]: expected {expected}, found {actual}")]
    Conflict {
        collection: CollectionName,
        id: DocumentId,
        expected: u64,
        actual: u64,
    },

    /// The request itself was malformed (e.g. too many ids in one batch)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Snapshot file could not be read or written
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Snapshot contents could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create an I/O error with path context
    pub fn io(source: io::Error, path: impl Into<PathBuf>) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if the operation may succeed when retried by the caller
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Conflict { .. }
        )
    }
}

/// Errors produced by the synchronization layer
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote store failure, passed through unchanged
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The parent document has no array for the reference field
    #[error("No parent array: [{collection}/{id}] has no '{field}' reference array")]
    NoParentArray {
        collection: CollectionName,
        id: DocumentId,
        field: &'static str,
    },

    /// The reference field holds something other than an array of ids
    #[error("Field '{field}' of [{collection}/{id}] is not an array of document ids")]
    NotAnArray {
        collection: CollectionName,
        id: DocumentId,
        field: &'static str,
    },

    /// A fetched document could not be decoded into its typed form
    #[error("Document [{collection}/{id}] could not be decoded: {source}")]
    Decode {
        collection: CollectionName,
        id: DocumentId,
        #[source]
        source: serde_json::Error,
    },

    /// A local value could not be encoded for the store
    #[error("Could not encode value for [{collection}]: {source}")]
    Encode {
        collection: CollectionName,
        #[source]
        source: serde_json::Error,
    },

    /// A query was built with arguments the store cannot evaluate
    #[error("Invalid query on [{collection}]: {reason}")]
    InvalidQuery {
        collection: CollectionName,
        reason: String,
    },

    /// An increment would not fit the numeric type of the field
    #[error("Incrementing '{field}' of [{collection}/{id}] would overflow its type")]
    Overflow {
        collection: CollectionName,
        id: DocumentId,
        field: &'static str,
    },

    /// A checked relate/unrelate kept losing the compare-and-swap race
    #[error("Gave up updating '{field}' of [{collection}/{id}] after {attempts} conflicting attempts")]
    RelateConflict {
        collection: CollectionName,
        id: DocumentId,
        field: &'static str,
        attempts: u32,
    },
}

impl SyncError {
    /// Check if this error originated in the remote store
    pub fn is_remote(&self) -> bool {
        matches!(self, SyncError::Store(_))
    }

    /// Check if this error is a structural condition of the data
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SyncError::NoParentArray { .. }
                | SyncError::NotAnArray { .. }
                | SyncError::Decode { .. }
        )
    }
}

/// Result type for synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for remote store operations
pub type StoreResult<T> = Result<T, StoreError>;
