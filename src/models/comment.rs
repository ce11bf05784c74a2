// src/models/comment.rs

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::AuthorSummary;

/// Text left in place of the body when a comment is deleted.
pub const TOMBSTONE_CONTENT: &str = "[deleted]";

/// Where a comment sits in its thread.
///
/// Converted to and from a nullable `parent_id` only at the storage and wire
/// boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum ParentRef {
    /// Top of a thread.
    #[default]
    Root,
    /// Reply to the comment with this id.
    ReplyTo(String),
}

impl ParentRef {
    pub fn is_root(&self) -> bool {
        matches!(self, ParentRef::Root)
    }

    /// The parent id, if this is a reply.
    pub fn parent_id(&self) -> Option<&str> {
        match self {
            ParentRef::Root => None,
            ParentRef::ReplyTo(id) => Some(id),
        }
    }
}

impl From<Option<String>> for ParentRef {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(id) => ParentRef::ReplyTo(id),
            None => ParentRef::Root,
        }
    }
}

impl From<ParentRef> for Option<String> {
    fn from(value: ParentRef) -> Self {
        match value {
            ParentRef::Root => None,
            ParentRef::ReplyTo(id) => Some(id),
        }
    }
}

/// A persisted comment row. Never carries replies or author data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub article_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "ParentRef::is_root")]
    pub parent_id: ParentRef,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Set when the comment has been tombstoned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CommentRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Sibling order inside a thread: oldest first, ties broken by id.
    pub fn thread_order(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// A comment as returned to clients: the record plus its author and replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub article_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "ParentRef::is_root")]
    pub parent_id: ParentRef,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,

    /// Attached at response time, never stored with the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorSummary>,

    /// Direct replies in thread order. Filled in by the threading assembler.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Comment>,
}

impl From<CommentRecord> for Comment {
    fn from(record: CommentRecord) -> Self {
        Comment {
            deleted: record.is_deleted(),
            id: record.id,
            article_id: record.article_id,
            user_id: record.user_id,
            parent_id: record.parent_id,
            content: record.content,
            created_at: record.created_at,
            updated_at: record.updated_at,
            author: None,
            replies: Vec::new(),
        }
    }
}

impl Comment {
    /// Number of comments in this node's subtree, itself included.
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.replies.iter());
        }
        count
    }

    /// Calls `f` on every node of the subtree, parents before children.
    pub fn for_each_mut(&mut self, f: &mut impl FnMut(&mut Comment)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            f(&mut *node);
            stack.extend(node.replies.iter_mut());
        }
    }
}

/// DTO for creating a new comment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentCreateRequest {
    #[validate(length(min = 1, max = 100, message = "article_id must be between 1 and 100 characters"))]
    pub article_id: String,

    /// Optional: the ID of the comment being replied to.
    #[serde(default)]
    pub parent_id: Option<String>,

    #[validate(
        length(max = 1000, message = "Comment must be at most 1000 characters"),
        custom(function = validate_not_blank)
    )]
    pub content: String,
}

/// DTO for editing a comment. Only the content is mutable.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentUpdateRequest {
    #[validate(
        length(max = 1000, message = "Comment must be at most 1000 characters"),
        custom(function = validate_not_blank)
    )]
    pub content: String,
}

/// Rejects content that is empty once surrounding whitespace is removed.
fn validate_not_blank(content: &str) -> Result<(), validator::ValidationError> {
    if content.trim().is_empty() {
        let mut err = validator::ValidationError::new("blank");
        err.message = Some("Comment content must not be empty".into());
        return Err(err);
    }
    Ok(())
}

/// Query parameters for listing comments.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// 1-indexed page of root threads (default: 1).
    pub page: Option<i64>,

    /// Root threads per page (default from configuration).
    pub page_size: Option<i64>,
}

/// One page of conversation threads for an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentListResponse {
    pub comments: Vec<Comment>,
    /// Number of root comments on the article.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, parent: Option<&str>) -> CommentRecord {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        CommentRecord {
            id: id.to_string(),
            article_id: "a1".to_string(),
            user_id: "u1".to_string(),
            parent_id: parent.map(str::to_string).into(),
            content: "hello".to_string(),
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    #[test]
    fn root_omits_parent_id_on_the_wire() {
        let json = serde_json::to_value(Comment::from(record("c1", None))).unwrap();
        assert!(json.get("parent_id").is_none());
        assert!(json.get("replies").is_none());
        assert!(json.get("author").is_none());

        let json = serde_json::to_value(Comment::from(record("c2", Some("c1")))).unwrap();
        assert_eq!(json["parent_id"], "c1");
    }

    #[test]
    fn parent_ref_reads_null_and_missing_as_root() {
        let with_null: CommentCreateRequest =
            serde_json::from_str(r#"{"article_id":"a1","parent_id":null,"content":"x"}"#).unwrap();
        assert!(with_null.parent_id.is_none());

        let c: Comment = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "article_id": "a1",
            "user_id": "u1",
            "content": "x",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(c.parent_id, ParentRef::Root);
    }

    #[test]
    fn thread_order_breaks_ties_by_id() {
        let a = record("a", None);
        let b = record("b", None);
        assert_eq!(a.thread_order(&b), Ordering::Less);
        assert_eq!(b.thread_order(&a), Ordering::Greater);
    }

    #[test]
    fn blank_content_fails_validation() {
        let req = CommentCreateRequest {
            article_id: "a1".to_string(),
            parent_id: None,
            content: "   \n\t".to_string(),
        };
        assert!(req.validate().is_err());

        let req = CommentUpdateRequest {
            content: "x".repeat(1001),
        };
        assert!(req.validate().is_err());

        let req = CommentUpdateRequest {
            content: "fine".to_string(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn subtree_len_counts_all_descendants() {
        let mut root = Comment::from(record("r", None));
        let mut child = Comment::from(record("c", Some("r")));
        child.replies.push(Comment::from(record("g", Some("c"))));
        root.replies.push(child);
        root.replies.push(Comment::from(record("d", Some("r"))));
        assert_eq!(root.subtree_len(), 4);
    }
}
