// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{ArticleDirectory, AuthorResolver, AuthorizationCheck, CommentStore, RowUpdate};
use crate::{
    error::{CommentError, Result},
    models::{comment::CommentRecord, user::AuthorSummary},
};

/// Represents the 'comments' table in the database.
#[derive(Debug, FromRow)]
struct CommentRow {
    id: String,
    article_id: String,
    user_id: String,
    parent_id: Option<String>,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        CommentRecord {
            id: row.id,
            article_id: row.article_id,
            user_id: row.user_id,
            parent_id: row.parent_id.into(),
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AuthorRow {
    id: String,
    username: String,
    role: String,
}

/// Postgres-backed implementation of every collaborator.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explains a guarded write that touched no row.
    async fn untouched(&self, id: &str) -> Result<RowUpdate> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM comments WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(if exists {
            RowUpdate::Tombstoned
        } else {
            RowUpdate::Missing
        })
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn fetch_by_article(&self, article_id: &str) -> Result<Vec<CommentRecord>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, article_id, user_id, parent_id, content,
                   created_at, updated_at, deleted_at
            FROM comments
            WHERE article_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch comments for article {}: {:?}", article_id, e);
            CommentError::from(e)
        })?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<CommentRecord>> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, article_id, user_id, parent_id, content,
                   created_at, updated_at, deleted_at
            FROM comments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CommentRecord::from))
    }

    async fn insert(&self, record: &CommentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO comments
                (id, article_id, user_id, parent_id, content, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&record.id)
        .bind(&record.article_id)
        .bind(&record.user_id)
        .bind(record.parent_id.parent_id())
        .bind(&record.content)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert comment {}: {:?}", record.id, e);
            CommentError::from(e)
        })?;

        Ok(())
    }

    async fn update_content(
        &self,
        id: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<RowUpdate> {
        let result = sqlx::query(
            r#"
            UPDATE comments
            SET content = $2, updated_at = $3
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(content)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return self.untouched(id).await;
        }
        Ok(RowUpdate::Applied)
    }

    async fn tombstone(
        &self,
        id: &str,
        content: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<RowUpdate> {
        let result = sqlx::query(
            r#"
            UPDATE comments
            SET content = $2, updated_at = $3, deleted_at = $3
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(content)
        .bind(deleted_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return self.untouched(id).await;
        }
        Ok(RowUpdate::Applied)
    }
}

#[async_trait]
impl ArticleDirectory for PgStore {
    async fn exists(&self, article_id: &str) -> Result<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM articles WHERE id = $1)")
                .bind(article_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl AuthorResolver for PgStore {
    async fn batch_resolve(&self, user_ids: &[String]) -> Result<HashMap<String, AuthorSummary>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, AuthorRow>(
            "SELECT id, username, role FROM users WHERE id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.id.clone(),
                    AuthorSummary {
                        id: row.id,
                        name: row.username,
                        role: row.role,
                    },
                )
            })
            .collect())
    }
}

#[async_trait]
impl AuthorizationCheck for PgStore {
    async fn is_author(&self, comment_id: &str, user_id: &str) -> Result<bool> {
        let is_author = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM comments WHERE id = $1 AND user_id = $2)",
        )
        .bind(comment_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(is_author)
    }
}
