//! Entities managed by the CLI
//!
//! A small blog: users author posts, and each user keeps the ids of their
//! posts in `postIds`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docsync_core::{new_document_id, Document, DocumentId, FieldPath, ReferenceField};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: DocumentId,
    pub created_at: DateTime<Utc>,
    pub name: String,
    #[serde(default)]
    pub post_ids: Vec<DocumentId>,
    #[serde(default)]
    pub post_count: i64,
}

impl User {
    pub const POST_IDS: ReferenceField<User> =
        FieldPath::new("postIds", |u| &u.post_ids, |u| &mut u.post_ids);
    pub const POST_COUNT: FieldPath<User, i64> =
        FieldPath::new("postCount", |u| &u.post_count, |u| &mut u.post_count);

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_document_id(),
            created_at: Utc::now(),
            name: name.into(),
            post_ids: Vec::new(),
            post_count: 0,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub likes: i64,
}

impl Post {
    pub const TITLE: FieldPath<Post, String> =
        FieldPath::new("title", |p| &p.title, |p| &mut p.title);
    pub const LIKES: FieldPath<Post, i64> =
        FieldPath::new("likes", |p| &p.likes, |p| &mut p.likes);

    pub fn new(author_id: &str, title: impl Into<String>, body: Option<String>) -> Self {
        Self {
            id: new_document_id(),
            created_at: Utc::now(),
            author_id: author_id.to_string(),
            title: title.into(),
            body,
            likes: 0,
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

/// Bookkeeping kept as a named singleton document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliInfo {
    pub last_write: Option<DateTime<Utc>>,
    #[serde(default)]
    pub writes: u64,
}

impl CliInfo {
    pub const NAME: &'static str = "cli";
}
