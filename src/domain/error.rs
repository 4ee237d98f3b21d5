use thiserror::Error;

use crate::domain::types::{CommentId, PostId, UserId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("image `{0}` not found")]
    ImageNotFound(String),
    #[error("{entity} with the same {field} already exists")]
    Conflict {
        entity: &'static str,
        field: &'static str,
    },
    #[error("validation failed for `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

impl DomainError {
    pub fn post_not_found(id: PostId) -> Self {
        Self::NotFound { entity: "post", id }
    }

    pub fn comment_not_found(id: CommentId) -> Self {
        Self::NotFound {
            entity: "comment",
            id,
        }
    }

    pub fn user_not_found(id: UserId) -> Self {
        Self::NotFound { entity: "user", id }
    }

    pub fn conflict(entity: &'static str, field: &'static str) -> Self {
        Self::Conflict { entity, field }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::ImageNotFound(_))
    }
}
