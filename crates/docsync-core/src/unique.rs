//! Named singleton documents
//!
//! Application-wide values (feature flags, counters shared by every client,
//! settings) are stored as one document per name in the `UniqueDocument`
//! collection. The document id is the name itself.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::store::Fields;

/// Collection holding every named singleton
pub const UNIQUE_COLLECTION: &str = "UniqueDocument";

impl SyncContext {
    /// Store `value` under `name`, replacing any previous value
    ///
    /// The value must serialize to a JSON object.
    pub async fn write_unique<T: Serialize>(&self, name: &str, value: &T) -> SyncResult<()> {
        let fields = to_fields(value)?;
        self.store()
            .set(UNIQUE_COLLECTION, name, fields)
            .await
            .inspect_err(|e| error!("Write of unique '{}' failed: {}", name, e))?;

        info!("Unique document '{}' written", name);
        Ok(())
    }

    /// Read the value stored under `name`, if any
    pub async fn fetch_unique<T: DeserializeOwned>(&self, name: &str) -> SyncResult<Option<T>> {
        let stored = self
            .store()
            .get(UNIQUE_COLLECTION, name)
            .await
            .inspect_err(|e| error!("Fetch of unique '{}' failed: {}", name, e))?;

        let Some(stored) = stored else {
            return Ok(None);
        };

        serde_json::from_value(Value::Object(stored.fields))
            .map(Some)
            .map_err(|source| SyncError::Decode {
                collection: UNIQUE_COLLECTION.to_string(),
                id: name.to_string(),
                source,
            })
    }
}

fn to_fields<T: Serialize>(value: &T) -> SyncResult<Fields> {
    let encode_error = |source: serde_json::Error| SyncError::Encode {
        collection: UNIQUE_COLLECTION.to_string(),
        source,
    };

    match serde_json::to_value(value).map_err(encode_error)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(encode_error(<serde_json::Error as serde::ser::Error>::custom(
            "unique documents must serialize to a JSON object",
        ))),
    }
}
