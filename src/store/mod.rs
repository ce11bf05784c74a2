// src/store/mod.rs

//! Contracts for everything the comment service delegates: comment
//! persistence, article lookup, author lookup and ownership checks.
//!
//! Implementations own their concurrency control and retry policy.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::Result,
    models::{comment::CommentRecord, user::AuthorSummary},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of a conditional write to a comment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowUpdate {
    Applied,
    /// No row has the id.
    Missing,
    /// The row is tombstoned and was left untouched.
    Tombstoned,
}

/// Flat comment rows.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Every row of the article, including tombstones, in no particular order.
    async fn fetch_by_article(&self, article_id: &str) -> Result<Vec<CommentRecord>>;

    async fn fetch_by_id(&self, id: &str) -> Result<Option<CommentRecord>>;

    async fn insert(&self, record: &CommentRecord) -> Result<()>;

    /// Writes only while the row is not tombstoned.
    async fn update_content(
        &self,
        id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<RowUpdate>;

    /// Replaces the content and stamps `deleted_at`, keeping the row in place.
    /// An already tombstoned row is left as it is.
    async fn tombstone(&self, id: &str, content: &str, deleted_at: DateTime<Utc>)
    -> Result<RowUpdate>;
}

#[async_trait]
pub trait ArticleDirectory: Send + Sync {
    async fn exists(&self, article_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait AuthorResolver: Send + Sync {
    /// Unknown ids are left out of the map.
    async fn batch_resolve(&self, user_ids: &[String]) -> Result<HashMap<String, AuthorSummary>>;
}

#[async_trait]
pub trait AuthorizationCheck: Send + Sync {
    async fn is_author(&self, comment_id: &str, user_id: &str) -> Result<bool>;
}
