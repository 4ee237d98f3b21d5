//! Repository traits describing persistence adapters.

use std::collections::BTreeSet;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::application::pagination::{Page, PageSpec, PaginationError};
use crate::domain::entities::{CommentRecord, PostRecord, PostSummary, UserRecord};
use crate::domain::types::{CommentId, PostId, UserId};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub title: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub content: String,
    pub author_id: UserId,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: PostId,
    pub title: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: PostId,
    pub parent_id: Option<CommentId>,
    pub author_id: UserId,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct UpdateUserParams {
    pub id: UserId,
    pub name: String,
    pub surname: String,
    pub username: String,
    pub picture_url: Option<String>,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn exists_post(&self, id: PostId) -> Result<bool, RepoError>;

    async fn exists_by_title(&self, title: &str) -> Result<bool, RepoError>;

    async fn find_post(&self, id: PostId) -> Result<Option<PostRecord>, RepoError>;

    async fn list_posts(&self, page: &PageSpec) -> Result<Page<PostSummary>, RepoError>;

    async fn list_posts_by_author(
        &self,
        author_id: UserId,
        page: &PageSpec,
    ) -> Result<Page<PostSummary>, RepoError>;

    async fn post_ids_by_author(&self, author_id: UserId) -> Result<Vec<PostId>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    /// Remove the post row together with every favourite link pointing at it.
    ///
    /// Comments must already be gone; adapters reject the delete otherwise.
    async fn delete_post(&self, id: PostId) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn exists_comment(&self, post_id: PostId, id: CommentId) -> Result<bool, RepoError>;

    async fn root_comment_ids(&self, post_id: PostId) -> Result<Vec<CommentId>, RepoError>;

    async fn child_comment_ids(
        &self,
        post_id: PostId,
        parent_id: CommentId,
    ) -> Result<Vec<CommentId>, RepoError>;

    async fn list_root_comments(
        &self,
        post_id: PostId,
        page: &PageSpec,
    ) -> Result<Page<CommentRecord>, RepoError>;

    async fn list_child_comments(
        &self,
        post_id: PostId,
        parent_id: CommentId,
        page: &PageSpec,
    ) -> Result<Page<CommentRecord>, RepoError>;
}

#[async_trait]
pub trait CommentsWriteRepo: Send + Sync {
    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;

    async fn update_comment(
        &self,
        post_id: PostId,
        id: CommentId,
        content: String,
    ) -> Result<CommentRecord, RepoError>;

    /// Remove a single comment row. Adapters reject the delete while children remain.
    async fn delete_comment(&self, id: CommentId) -> Result<(), RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn exists_user(&self, id: UserId) -> Result<bool, RepoError>;

    async fn exists_by_username(&self, username: &str) -> Result<bool, RepoError>;

    async fn find_user(&self, id: UserId) -> Result<Option<UserRecord>, RepoError>;

    async fn list_favourite_posts(
        &self,
        user_id: UserId,
        page: &PageSpec,
    ) -> Result<Page<PostSummary>, RepoError>;
}

#[async_trait]
pub trait UsersWriteRepo: Send + Sync {
    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError>;

    /// Fails with [`RepoError::Duplicate`] when the link already exists.
    async fn add_favourite(&self, user_id: UserId, post_id: PostId) -> Result<(), RepoError>;

    /// Returns `true` when a favourite link was removed.
    async fn remove_favourite(&self, user_id: UserId, post_id: PostId)
    -> Result<bool, RepoError>;

    /// Remove the user row and the user's favourite links.
    async fn delete_user(&self, id: UserId) -> Result<(), RepoError>;
}

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("unsupported image format for `{0}`")]
    UnsupportedFormat(String),
    #[error("invalid image filename")]
    InvalidFilename,
    #[error("image payload is empty")]
    EmptyPayload,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Storage for uploaded images (post images, user pictures), addressed by stored filename.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist the payload under a unique filename derived from `original_name`.
    async fn store(&self, original_name: &str, payload: Bytes) -> Result<String, ImageStoreError>;

    async fn load(&self, filename: &str) -> Result<Option<Bytes>, ImageStoreError>;

    /// Returns `true` when a file was removed.
    async fn delete_if_exists(&self, filename: &str) -> Result<bool, ImageStoreError>;
}
