// src/services/comment.rs

use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};

use chrono::{TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::{
    config::Config,
    error::{CommentError, Result},
    models::comment::{
        Comment, CommentCreateRequest, CommentListResponse, CommentRecord, CommentUpdateRequest,
        ParentRef, TOMBSTONE_CONTENT,
    },
    services::{
        pagination::{PageRequest, paginate},
        thread::assemble,
    },
    store::{ArticleDirectory, AuthorResolver, AuthorizationCheck, CommentStore, RowUpdate},
    utils::html::sanitize_content,
};

/// The user a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub user_id: String,
    pub role: String,
}

impl Requester {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Longest comment body, in characters, after sanitising.
const MAX_CONTENT_CHARS: usize = 1000;

/// Per-request identity, cancellation and deadline.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    requester: Option<Requester>,
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(requester: Requester) -> Self {
        Self {
            requester: Some(requester),
            ..Self::default()
        }
    }

    /// Overrides the service-wide deadline for each collaborator call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Ties the request to an external cancellation source.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(CommentError::Cancelled);
        }
        Ok(())
    }

    fn authenticated(&self) -> Result<&Requester> {
        self.requester.as_ref().ok_or(CommentError::Unauthenticated)
    }
}

/// Tunables the service reads from configuration.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub request_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
            request_timeout: config.request_timeout,
        }
    }
}

/// Create, edit, delete and list threaded comments.
///
/// Holds no mutable state; every call is independent and all shared data
/// lives behind the collaborators.
#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentStore>,
    articles: Arc<dyn ArticleDirectory>,
    authors: Arc<dyn AuthorResolver>,
    authorization: Arc<dyn AuthorizationCheck>,
    settings: ServiceSettings,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentStore>,
        articles: Arc<dyn ArticleDirectory>,
        authors: Arc<dyn AuthorResolver>,
        authorization: Arc<dyn AuthorizationCheck>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            comments,
            articles,
            authors,
            authorization,
            settings,
        }
    }

    /// Uses one backend for every collaborator.
    pub fn with_backend<B>(backend: Arc<B>, settings: ServiceSettings) -> Self
    where
        B: CommentStore + ArticleDirectory + AuthorResolver + AuthorizationCheck + 'static,
    {
        Self::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend,
            settings,
        )
    }

    /// Awaits a collaborator call, giving up on cancellation or deadline.
    async fn call<T>(&self, ctx: &RequestContext, fut: impl Future<Output = Result<T>>) -> Result<T> {
        ctx.ensure_active()?;
        let timeout = ctx.timeout.unwrap_or(self.settings.request_timeout);

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(CommentError::Cancelled),
            res = tokio::time::timeout(timeout, fut) => res.map_err(|_| CommentError::Timeout)?,
        }
    }

    async fn load(&self, ctx: &RequestContext, id: &str) -> Result<CommentRecord> {
        self.call(ctx, self.comments.fetch_by_id(id))
            .await?
            .ok_or_else(|| CommentError::NotFound(format!("Comment {} not found", id)))
    }

    /// Resolves every author in `nodes` with one lookup and attaches them.
    async fn attach_authors(&self, ctx: &RequestContext, nodes: &mut [Comment]) -> Result<()> {
        let mut ids = HashSet::new();
        for node in nodes.iter_mut() {
            node.for_each_mut(&mut |c: &mut Comment| {
                ids.insert(c.user_id.clone());
            });
        }
        if ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = ids.into_iter().collect();
        let authors = self.call(ctx, self.authors.batch_resolve(&ids)).await?;

        for node in nodes.iter_mut() {
            node.for_each_mut(&mut |c: &mut Comment| {
                c.author = authors.get(&c.user_id).cloned();
            });
        }
        Ok(())
    }

    async fn present(&self, ctx: &RequestContext, record: CommentRecord) -> Result<Comment> {
        let mut nodes = [Comment::from(record)];
        self.attach_authors(ctx, &mut nodes).await?;
        let [comment] = nodes;
        Ok(comment)
    }

    /// Posts a new root comment or reply.
    #[tracing::instrument(skip(self, ctx, req), fields(article_id = %req.article_id))]
    pub async fn create_comment(
        &self,
        ctx: &RequestContext,
        req: CommentCreateRequest,
    ) -> Result<Comment> {
        let requester = ctx.authenticated()?;
        req.validate()?;
        let content = clean_content(&req.content)?;

        if !self.call(ctx, self.articles.exists(&req.article_id)).await? {
            return Err(CommentError::NotFound(format!(
                "Article {} not found",
                req.article_id
            )));
        }

        let parent_id = ParentRef::from(req.parent_id);
        if let ParentRef::ReplyTo(pid) = &parent_id {
            let parent = self
                .call(ctx, self.comments.fetch_by_id(pid))
                .await?
                .ok_or_else(|| CommentError::NotFound(format!("Parent comment {} not found", pid)))?;

            if parent.article_id != req.article_id {
                return Err(CommentError::InvalidArgument(format!(
                    "Parent comment {} belongs to a different article",
                    pid
                )));
            }
            if parent.is_deleted() {
                return Err(CommentError::InvalidArgument(format!(
                    "Cannot reply to deleted comment {}",
                    pid
                )));
            }
        }

        let now = Utc::now();
        let record = CommentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            article_id: req.article_id,
            user_id: requester.user_id.clone(),
            parent_id,
            content,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        self.call(ctx, self.comments.insert(&record)).await?;
        tracing::info!(comment_id = %record.id, user_id = %record.user_id, "comment created");

        self.present(ctx, record).await
    }

    /// Replaces the content of a comment. Only its author may do this.
    #[tracing::instrument(skip(self, ctx, req))]
    pub async fn update_comment(
        &self,
        ctx: &RequestContext,
        id: &str,
        req: CommentUpdateRequest,
    ) -> Result<Comment> {
        let requester = ctx.authenticated()?;
        req.validate()?;
        let content = clean_content(&req.content)?;

        let mut record = self.load(ctx, id).await?;

        let is_author = self
            .call(ctx, self.authorization.is_author(id, &requester.user_id))
            .await?;
        if !is_author {
            tracing::warn!(comment_id = %id, user_id = %requester.user_id, "edit by non-author refused");
            return Err(CommentError::Forbidden(
                "You can only edit your own comments".to_string(),
            ));
        }
        if record.is_deleted() {
            return Err(CommentError::InvalidArgument(format!(
                "Comment {} has been deleted",
                id
            )));
        }

        let updated_at = Utc::now().max(record.updated_at + TimeDelta::microseconds(1));
        match self
            .call(ctx, self.comments.update_content(id, &content, updated_at))
            .await?
        {
            RowUpdate::Applied => {}
            RowUpdate::Missing => {
                return Err(CommentError::NotFound(format!("Comment {} not found", id)));
            }
            RowUpdate::Tombstoned => {
                tracing::warn!(comment_id = %id, "edit lost to a concurrent delete");
                return Err(CommentError::InvalidArgument(format!(
                    "Comment {} has been deleted",
                    id
                )));
            }
        }
        tracing::info!(comment_id = %id, "comment updated");

        record.content = content;
        record.updated_at = updated_at;
        self.present(ctx, record).await
    }

    /// Tombstones a comment: the body is replaced, the row and its replies stay.
    /// Allowed for the author and for admins. Deleting twice is a no-op.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn delete_comment(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        let requester = ctx.authenticated()?;
        let record = self.load(ctx, id).await?;

        let allowed = requester.is_admin()
            || self
                .call(ctx, self.authorization.is_author(id, &requester.user_id))
                .await?;
        if !allowed {
            return Err(CommentError::Forbidden(
                "You are not authorized to delete this comment".to_string(),
            ));
        }
        if record.is_deleted() {
            return Ok(());
        }

        match self
            .call(ctx, self.comments.tombstone(id, TOMBSTONE_CONTENT, Utc::now()))
            .await?
        {
            RowUpdate::Applied => {
                tracing::info!(comment_id = %id, user_id = %requester.user_id, "comment tombstoned");
                Ok(())
            }
            RowUpdate::Tombstoned => Ok(()),
            RowUpdate::Missing => Err(CommentError::NotFound(format!("Comment {} not found", id))),
        }
    }

    /// A single comment with its author, without replies.
    pub async fn get_comment(&self, ctx: &RequestContext, id: &str) -> Result<Comment> {
        let record = self.load(ctx, id).await?;
        self.present(ctx, record).await
    }

    /// One page of reply threads for an article.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn list_comments(
        &self,
        ctx: &RequestContext,
        article_id: &str,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<CommentListResponse> {
        let default_size = i64::try_from(self.settings.default_page_size).unwrap_or(i64::MAX);
        let request = PageRequest::new(page.unwrap_or(1), page_size.unwrap_or(default_size))?;
        if request.page_size() > self.settings.max_page_size {
            return Err(CommentError::InvalidArgument(format!(
                "page_size must be <= {}",
                self.settings.max_page_size
            )));
        }

        if !self.call(ctx, self.articles.exists(article_id)).await? {
            return Err(CommentError::NotFound(format!(
                "Article {} not found",
                article_id
            )));
        }

        let records = self.call(ctx, self.comments.fetch_by_article(article_id)).await?;
        ctx.ensure_active()?;

        let forest = assemble(records).map_err(|e| {
            tracing::error!(article_id = %article_id, "cannot thread comments: {}", e);
            e
        })?;
        for warning in &forest.warnings {
            tracing::warn!(article_id = %article_id, "{}", warning);
        }

        let mut page = paginate(forest.roots, request);
        self.attach_authors(ctx, &mut page.items).await?;

        Ok(page.into())
    }
}

/// Sanitises content and rejects what is left empty or too long.
fn clean_content(raw: &str) -> Result<String> {
    let content = sanitize_content(raw);
    if content.is_empty() {
        return Err(CommentError::InvalidArgument(
            "Comment content must not be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(CommentError::InvalidArgument(format!(
            "Comment must be at most {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(content)
}
