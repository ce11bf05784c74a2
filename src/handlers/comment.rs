// src/handlers/comment.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use crate::{
    error::AppError,
    models::comment::{CommentCreateRequest, CommentUpdateRequest, ListParams},
    services::{CommentService, RequestContext},
    utils::jwt::Claims,
};

/// Builds the context for one request. A client disconnect drops the handler
/// future, which abandons any in-flight store call along with it.
fn request_context(claims: Option<&Claims>) -> RequestContext {
    match claims {
        Some(claims) => RequestContext::for_user(claims.requester()),
        None => RequestContext::anonymous(),
    }
}

/// List comment threads for an article, one page of root comments at a time.
pub async fn list_comments(
    State(service): State<Arc<CommentService>>,
    Path(article_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = request_context(None);

    let page = service
        .list_comments(&ctx, &article_id, params.page, params.page_size)
        .await?;

    Ok(Json(page))
}

/// Get a single comment by ID (without replies).
pub async fn get_comment(
    State(service): State<Arc<CommentService>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = request_context(None);
    let comment = service.get_comment(&ctx, &id).await?;
    Ok(Json(comment))
}

/// Create a new comment or reply.
/// Requires: Login.
pub async fn create_comment(
    State(service): State<Arc<CommentService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CommentCreateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = request_context(Some(&claims));
    let comment = service.create_comment(&ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Edit the content of a comment.
/// Requires: Login + Author.
pub async fn update_comment(
    State(service): State<Arc<CommentService>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<CommentUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = request_context(Some(&claims));
    let comment = service.update_comment(&ctx, &id, payload).await?;
    Ok(Json(comment))
}

/// Delete a comment (Tombstone: content replaced, replies kept).
/// Requires: Login + (Author OR Admin).
pub async fn delete_comment(
    State(service): State<Arc<CommentService>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = request_context(Some(&claims));
    service.delete_comment(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
