// src/services/mod.rs

pub mod comment;
pub mod pagination;
pub mod thread;

pub use comment::{CommentService, RequestContext, Requester, ServiceSettings};
