// src/models/user.rs

use serde::{Deserialize, Serialize};

/// Author fields attached to each comment in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: String,

    /// Display name.
    pub name: String,

    /// User role: 'user' or 'admin'.
    pub role: String,
}

impl AuthorSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
        }
    }
}
