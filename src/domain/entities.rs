//! Domain entities mirrored from persistent storage.

use std::collections::BTreeSet;

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::types::{CommentId, PostId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: PostId,
    pub title: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub content: String,
    pub author_id: UserId,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
}

impl PostRecord {
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            author_id: self.author_id,
            image_url: self.image_url.clone(),
            created_at: self.created_at,
        }
    }

    /// Name of the stored image file, taken from the last path segment of the URL.
    pub fn image_filename(&self) -> Option<&str> {
        self.image_url.as_deref().and_then(last_path_segment)
    }
}

/// List projection of a post without its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    pub id: PostId,
    pub title: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub author_id: UserId,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub id: CommentId,
    pub post_id: PostId,
    /// `None` marks a root comment.
    pub parent_id: Option<CommentId>,
    pub author_id: UserId,
    pub content: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub surname: String,
    pub username: String,
    pub picture_url: Option<String>,
}

impl UserRecord {
    /// Name of the stored picture file, taken from the last path segment of the URL.
    pub fn picture_filename(&self) -> Option<&str> {
        self.picture_url.as_deref().and_then(last_path_segment)
    }
}

pub fn last_path_segment(url: &str) -> Option<&str> {
    let segment = url.rsplit('/').next()?;
    (!segment.is_empty()).then_some(segment)
}
