// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Errors produced by the comment core (threading, pagination, service).
#[derive(Debug, Error)]
pub enum CommentError {
    /// Bad pagination parameters, empty content, malformed request.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown comment, article or parent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requester may not perform this action on the comment.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A write was attempted without an identified requester.
    #[error("Authentication required")]
    Unauthenticated,

    /// The stored parent chain is corrupted (cycle, duplicate id).
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    /// A collaborator failed to read or write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The caller abandoned the request.
    #[error("Request cancelled")]
    Cancelled,

    /// A collaborator call exceeded the request deadline.
    #[error("Request timed out")]
    Timeout,
}

/// Result alias for the comment core.
pub type Result<T> = std::result::Result<T, CommentError>;

impl From<sqlx::Error> for CommentError {
    fn from(err: sqlx::Error) -> Self {
        CommentError::Storage(err.to_string())
    }
}

impl From<validator::ValidationErrors> for CommentError {
    fn from(err: validator::ValidationErrors) -> Self {
        CommentError::InvalidArgument(err.to_string())
    }
}

/// Global Application Error Enum.
/// Centralizes mapping of failures to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 408 Request Timeout (client went away)
    RequestTimeout(String),

    // 504 Gateway Timeout (a collaborator was too slow)
    GatewayTimeout(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::RequestTimeout(msg) => (StatusCode::REQUEST_TIMEOUT, msg),
            AppError::GatewayTimeout(msg) => {
                tracing::warn!("Gateway Timeout: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, msg)
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CommentError> for AppError {
    fn from(err: CommentError) -> Self {
        match err {
            CommentError::InvalidArgument(msg) => AppError::BadRequest(msg),
            CommentError::NotFound(msg) => AppError::NotFound(msg),
            CommentError::Forbidden(msg) => AppError::Forbidden(msg),
            CommentError::Unauthenticated => AppError::AuthError(err.to_string()),
            CommentError::DataIntegrity(msg) => {
                AppError::InternalServerError(format!("data integrity: {}", msg))
            }
            CommentError::Storage(msg) => AppError::InternalServerError(msg),
            CommentError::Cancelled => AppError::RequestTimeout(err.to_string()),
            CommentError::Timeout => AppError::GatewayTimeout(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_error_display() {
        let err = CommentError::NotFound("comment c1".to_string());
        assert_eq!(err.to_string(), "Not found: comment c1");
    }

    #[test]
    fn maps_core_errors_to_http_status() {
        let cases = [
            (CommentError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (CommentError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (CommentError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (CommentError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CommentError::Cancelled, StatusCode::REQUEST_TIMEOUT),
            (CommentError::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (
                CommentError::DataIntegrity("cycle".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                CommentError::Storage("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
