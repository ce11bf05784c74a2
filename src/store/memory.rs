// src/store/memory.rs

//! In-process implementation of every collaborator, for tests and local runs.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ArticleDirectory, AuthorResolver, AuthorizationCheck, CommentStore, RowUpdate};
use crate::{
    error::{CommentError, Result},
    models::{comment::CommentRecord, user::AuthorSummary},
};

#[derive(Default)]
struct Tables {
    comments: HashMap<String, CommentRecord>,
    articles: HashSet<String>,
    users: HashMap<String, AuthorSummary>,
}

/// Hash-map backed store. Can simulate latency and outages.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
    resolve_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_article(&self, article_id: impl Into<String>) {
        self.write().articles.insert(article_id.into());
    }

    pub fn add_user(&self, author: AuthorSummary) {
        self.write().users.insert(author.id.clone(), author);
    }

    /// Stores a row as-is, bypassing every check. Lets tests plant corrupt data.
    pub fn put_record(&self, record: CommentRecord) {
        self.write().comments.insert(record.id.clone(), record);
    }

    pub fn record(&self, id: &str) -> Option<CommentRecord> {
        self.read().comments.get(id).cloned()
    }

    /// Makes every call fail with a storage error until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// How many times `batch_resolve` has been called.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    async fn io(&self) -> Result<()> {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CommentError::Storage("memory store unavailable".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn fetch_by_article(&self, article_id: &str) -> Result<Vec<CommentRecord>> {
        self.io().await?;
        Ok(self
            .read()
            .comments
            .values()
            .filter(|c| c.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<CommentRecord>> {
        self.io().await?;
        Ok(self.read().comments.get(id).cloned())
    }

    async fn insert(&self, record: &CommentRecord) -> Result<()> {
        self.io().await?;
        let mut tables = self.write();
        if tables.comments.contains_key(&record.id) {
            return Err(CommentError::Storage(format!(
                "duplicate key: comment {}",
                record.id
            )));
        }
        tables.comments.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_content(
        &self,
        id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<RowUpdate> {
        self.io().await?;
        let mut tables = self.write();
        let Some(record) = tables.comments.get_mut(id) else {
            return Ok(RowUpdate::Missing);
        };
        if record.is_deleted() {
            return Ok(RowUpdate::Tombstoned);
        }
        record.content = content.to_string();
        record.updated_at = updated_at;
        Ok(RowUpdate::Applied)
    }

    async fn tombstone(
        &self,
        id: &str,
        content: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<RowUpdate> {
        self.io().await?;
        let mut tables = self.write();
        let Some(record) = tables.comments.get_mut(id) else {
            return Ok(RowUpdate::Missing);
        };
        if record.is_deleted() {
            return Ok(RowUpdate::Tombstoned);
        }
        record.content = content.to_string();
        record.updated_at = deleted_at;
        record.deleted_at = Some(deleted_at);
        Ok(RowUpdate::Applied)
    }
}

#[async_trait]
impl ArticleDirectory for MemoryStore {
    async fn exists(&self, article_id: &str) -> Result<bool> {
        self.io().await?;
        Ok(self.read().articles.contains(article_id))
    }
}

#[async_trait]
impl AuthorResolver for MemoryStore {
    async fn batch_resolve(&self, user_ids: &[String]) -> Result<HashMap<String, AuthorSummary>> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.io().await?;
        let tables = self.read();
        Ok(user_ids
            .iter()
            .filter_map(|id| tables.users.get(id).map(|a| (id.clone(), a.clone())))
            .collect())
    }
}

#[async_trait]
impl AuthorizationCheck for MemoryStore {
    async fn is_author(&self, comment_id: &str, user_id: &str) -> Result<bool> {
        self.io().await?;
        Ok(self
            .read()
            .comments
            .get(comment_id)
            .is_some_and(|c| c.user_id == user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::comment::TOMBSTONE_CONTENT;
    use chrono::TimeZone;

    fn row(id: &str) -> CommentRecord {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        CommentRecord {
            id: id.to_string(),
            article_id: "a1".to_string(),
            user_id: "alice".to_string(),
            parent_id: None.into(),
            content: "original".to_string(),
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn update_after_tombstone_leaves_the_row_alone() {
        let store = MemoryStore::new();
        store.put_record(row("C1"));
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();

        let outcome = store.tombstone("C1", TOMBSTONE_CONTENT, at).await.unwrap();
        assert_eq!(outcome, RowUpdate::Applied);

        let outcome = store.update_content("C1", "edited", at).await.unwrap();
        assert_eq!(outcome, RowUpdate::Tombstoned);

        let stored = store.record("C1").unwrap();
        assert_eq!(stored.content, TOMBSTONE_CONTENT);
        assert_eq!(stored.deleted_at, Some(at));
    }

    #[tokio::test]
    async fn second_tombstone_keeps_the_first_stamp() {
        let store = MemoryStore::new();
        store.put_record(row("C1"));
        let first = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 3, 12, 0, 0).unwrap();

        store.tombstone("C1", TOMBSTONE_CONTENT, first).await.unwrap();
        let outcome = store.tombstone("C1", TOMBSTONE_CONTENT, second).await.unwrap();

        assert_eq!(outcome, RowUpdate::Tombstoned);
        assert_eq!(store.record("C1").unwrap().deleted_at, Some(first));
    }

    #[tokio::test]
    async fn writes_to_unknown_rows_report_missing() {
        let store = MemoryStore::new();
        let at = Utc::now();
        assert_eq!(
            store.update_content("nope", "x", at).await.unwrap(),
            RowUpdate::Missing
        );
        assert_eq!(
            store.tombstone("nope", TOMBSTONE_CONTENT, at).await.unwrap(),
            RowUpdate::Missing
        );
    }
}
