//! Fixtures shared by the unit tests

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Config, RelateMode};
use crate::context::SyncContext;
use crate::model::{new_document_id, Document, DocumentId, FieldPath, ReferenceField};
use crate::store::MemoryStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: DocumentId,
    pub created_at: DateTime<Utc>,
    pub display_name: String,
    pub post_ids: Vec<DocumentId>,
    pub post_count: i64,
    pub rating: f64,
}

impl User {
    pub const DISPLAY_NAME: FieldPath<User, String> =
        FieldPath::new("displayName", |u| &u.display_name, |u| &mut u.display_name);
    pub const POST_IDS: ReferenceField<User> =
        FieldPath::new("postIds", |u| &u.post_ids, |u| &mut u.post_ids);
    pub const POST_COUNT: FieldPath<User, i64> =
        FieldPath::new("postCount", |u| &u.post_count, |u| &mut u.post_count);
    pub const RATING: FieldPath<User, f64> =
        FieldPath::new("rating", |u| &u.rating, |u| &mut u.rating);

    pub fn new(display_name: &str) -> Self {
        Self::with_id(&new_document_id(), display_name)
    }

    pub fn with_id(id: &str, display_name: &str) -> Self {
        Self {
            id: id.to_string(),
            created_at: Utc::now(),
            display_name: display_name.to_string(),
            post_ids: Vec::new(),
            post_count: 0,
            rating: 0.0,
        }
    }
}

impl Document for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: DocumentId,
    pub created_at: DateTime<Utc>,
    pub author_id: DocumentId,
    pub title: String,
    pub likes: i64,
    pub tags: Vec<String>,
}

impl Post {
    pub const TITLE: FieldPath<Post, String> =
        FieldPath::new("title", |p| &p.title, |p| &mut p.title);
    pub const LIKES: FieldPath<Post, i64> =
        FieldPath::new("likes", |p| &p.likes, |p| &mut p.likes);
    pub const TAGS: FieldPath<Post, Vec<String>> =
        FieldPath::new("tags", |p| &p.tags, |p| &mut p.tags);

    pub fn new(author_id: &str, title: &str) -> Self {
        Self::with_id(&new_document_id(), author_id, title)
    }

    pub fn with_id(id: &str, author_id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            created_at: Utc::now(),
            author_id: author_id.to_string(),
            title: title.to_string(),
            likes: 0,
            tags: Vec::new(),
        }
    }
}

impl Document for Post {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A context over a fresh memory store with default configuration
pub fn context() -> (SyncContext, Arc<MemoryStore>) {
    context_with(Config::default())
}

pub fn context_with(config: Config) -> (SyncContext, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let ctx = SyncContext::new(store.clone(), config);
    (ctx, store)
}

pub fn config_with_mode(mode: RelateMode) -> Config {
    Config {
        relate_mode: mode,
        ..Config::default()
    }
}
