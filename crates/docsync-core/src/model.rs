//! Document model and naming
//!
//! A [`Document`] is a typed, identified record stored in a remote
//! collection. Every document type maps to exactly one collection, named by
//! [`collection_name`]: the Rust type name with its module path stripped.
//!
//! Individual fields are addressed through [`FieldPath`] constants declared
//! next to the entity, which pair the remote field name with typed
//! accessors:
//!
//! ```ignore
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! pub struct User {
//!     pub id: DocumentId,
//!     pub created_at: DateTime<Utc>,
//!     pub display_name: String,
//!     pub post_ids: Vec<DocumentId>,
//! }
//!
//! impl User {
//!     pub const DISPLAY_NAME: FieldPath<User, String> =
//!         FieldPath::new("displayName", |u| &u.display_name, |u| &mut u.display_name);
//!     pub const POST_IDS: ReferenceField<User> =
//!         FieldPath::new("postIds", |u| &u.post_ids, |u| &mut u.post_ids);
//! }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::store::{Fields, StoredDocument};

/// The id of a document, unique within its collection
pub type DocumentId = String;

/// The name of a collection
pub type CollectionName = String;

/// A typed entity persisted in a remote collection
///
/// Documents serialize (via serde) into a JSON object whose keys are the
/// remote field names. Two documents with the same id written to the same
/// collection overwrite one another.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The document's unique identifier
    fn id(&self) -> &str;

    /// When the document was created; set once and never updated
    fn created_at(&self) -> DateTime<Utc>;

    /// Name of the collection documents of this type live in
    fn collection() -> CollectionName {
        collection_name::<Self>()
    }
}

/// Collection name for a type: its type name without module paths
///
/// `my_app::models::Post` becomes `Post`, and
/// `my_app::Draft<my_app::models::Post>` becomes `Draft<Post>`.
pub fn collection_name<T: ?Sized>() -> CollectionName {
    strip_module_paths(std::any::type_name::<T>())
}

/// Strip every `a::b::` prefix from the paths inside a type name
pub fn strip_module_paths(type_name: &str) -> String {
    let mut out = String::with_capacity(type_name.len());
    let mut path = String::new();

    for c in type_name.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            path.push(c);
        } else {
            out.push_str(last_segment(&path));
            path.clear();
            out.push(c);
        }
    }
    out.push_str(last_segment(&path));
    out
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Generate a collision-resistant document id (a dash-less UUID v4)
pub fn new_document_id() -> DocumentId {
    Uuid::new_v4().simple().to_string()
}

/// A typed path to one field of a document
///
/// Carries the field's remote name together with accessors, so a field can
/// be read, written and sent to the store without deriving names at
/// runtime.
pub struct FieldPath<D, V> {
    name: &'static str,
    get: fn(&D) -> &V,
    get_mut: fn(&mut D) -> &mut V,
}

/// A field holding a set of child document ids
pub type ReferenceField<D> = FieldPath<D, Vec<DocumentId>>;

impl<D, V> FieldPath<D, V> {
    pub const fn new(name: &'static str, get: fn(&D) -> &V, get_mut: fn(&mut D) -> &mut V) -> Self {
        Self { name, get, get_mut }
    }

    /// The field's name in the remote store
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn get<'a>(&self, document: &'a D) -> &'a V {
        (self.get)(document)
    }

    pub fn get_mut<'a>(&self, document: &'a mut D) -> &'a mut V {
        (self.get_mut)(document)
    }

    pub fn set(&self, document: &mut D, value: V) {
        *(self.get_mut)(document) = value;
    }
}

impl<D, V> Clone for FieldPath<D, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D, V> Copy for FieldPath<D, V> {}

impl<D, V> fmt::Debug for FieldPath<D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldPath").field(&self.name).finish()
    }
}

/// Serialize a document into the store's field representation
pub(crate) fn encode<D: Document>(document: &D) -> SyncResult<Fields> {
    match serde_json::to_value(document) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(SyncError::Encode {
            collection: D::collection(),
            source: <serde_json::Error as serde::ser::Error>::custom(
                "documents must serialize to a JSON object",
            ),
        }),
        Err(source) => Err(SyncError::Encode {
            collection: D::collection(),
            source,
        }),
    }
}

/// Serialize a single field value
pub(crate) fn encode_value<D: Document, V: Serialize>(value: &V) -> SyncResult<Value> {
    serde_json::to_value(value).map_err(|source| SyncError::Encode {
        collection: D::collection(),
        source,
    })
}

/// Decode a stored document into its typed form
pub(crate) fn decode<D: Document>(stored: StoredDocument) -> SyncResult<D> {
    let StoredDocument { id, fields, .. } = stored;
    serde_json::from_value(Value::Object(fields)).map_err(|source| SyncError::Decode {
        collection: D::collection(),
        id,
        source,
    })
}

/// A single-entry field map
pub(crate) fn single_field(name: &str, value: Value) -> Fields {
    let mut fields = Fields::new();
    fields.insert(name.to_string(), value);
    fields
}
