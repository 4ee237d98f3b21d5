//! Threaded comment reads and writes.

use std::sync::Arc;

use tracing::info;

use crate::application::deletion::DeletionCoordinator;
use crate::application::error::AppError;
use crate::application::pagination::{Page, PageSpec};
use crate::application::repos::{
    CommentsRepo, CommentsWriteRepo, CreateCommentParams, PostsRepo, UsersRepo,
};
use crate::application::validation::{COMMENT_MAX_CHARS, ensure_max_chars, ensure_non_empty};
use crate::cache::{CacheKey, CacheStore, InvalidationPolicy, MutationEvent, Region};
use crate::domain::entities::CommentRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{CommentId, PostId, UserId};

#[derive(Debug, Clone)]
pub struct CreateCommentCommand {
    pub post_id: PostId,
    /// `None` creates a root comment.
    pub parent_id: Option<CommentId>,
    pub author_id: UserId,
    pub content: String,
}

fn validate_content(content: &str) -> Result<(), DomainError> {
    ensure_non_empty(content, "content")?;
    ensure_max_chars(content, "content", COMMENT_MAX_CHARS)
}

#[derive(Clone)]
pub struct CommentService {
    reader: Arc<dyn CommentsRepo>,
    writer: Arc<dyn CommentsWriteRepo>,
    posts: Arc<dyn PostsRepo>,
    users: Arc<dyn UsersRepo>,
    cache: Arc<CacheStore>,
    invalidation: InvalidationPolicy,
    deletion: DeletionCoordinator,
}

impl CommentService {
    pub fn new(
        reader: Arc<dyn CommentsRepo>,
        writer: Arc<dyn CommentsWriteRepo>,
        posts: Arc<dyn PostsRepo>,
        users: Arc<dyn UsersRepo>,
        invalidation: InvalidationPolicy,
        deletion: DeletionCoordinator,
    ) -> Self {
        Self {
            reader,
            writer,
            posts,
            users,
            cache: invalidation.store().clone(),
            invalidation,
            deletion,
        }
    }

    pub async fn create_comment(
        &self,
        command: CreateCommentCommand,
    ) -> Result<CommentRecord, AppError> {
        validate_content(&command.content)?;
        self.ensure_post(command.post_id).await?;
        if !self.users.exists_user(command.author_id).await? {
            return Err(DomainError::user_not_found(command.author_id).into());
        }
        if let Some(parent_id) = command.parent_id {
            self.ensure_comment(command.post_id, parent_id).await?;
        }

        let comment = self
            .writer
            .create_comment(CreateCommentParams {
                post_id: command.post_id,
                parent_id: command.parent_id,
                author_id: command.author_id,
                content: command.content,
            })
            .await?;

        self.invalidation.apply(&MutationEvent::CommentCreated {
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            comment_id: comment.id,
        });
        info!(
            post_id = comment.post_id,
            comment_id = comment.id,
            parent_id = ?comment.parent_id,
            "Comment created"
        );
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        content: String,
    ) -> Result<CommentRecord, AppError> {
        validate_content(&content)?;
        self.ensure_post(post_id).await?;
        self.ensure_comment(post_id, comment_id).await?;

        let comment = self
            .writer
            .update_comment(post_id, comment_id, content)
            .await?;

        self.invalidation.apply(&MutationEvent::CommentUpdated {
            post_id,
            comment_id,
        });
        info!(post_id, comment_id, "Comment updated");
        Ok(comment)
    }

    /// Delete a comment together with all of its replies.
    pub async fn delete_comment(
        &self,
        post_id: PostId,
        comment_id: CommentId,
    ) -> Result<Vec<CommentId>, AppError> {
        Ok(self
            .deletion
            .delete_comment_subtree(post_id, comment_id)
            .await?)
    }

    pub async fn list_root_comments(
        &self,
        post_id: PostId,
        page: &PageSpec,
    ) -> Result<Page<CommentRecord>, AppError> {
        self.cache
            .get_or_load(
                Region::RootComments,
                CacheKey::root_comments(post_id, page.clone()),
                move || self.load_roots(post_id, page),
            )
            .await
    }

    pub async fn list_child_comments(
        &self,
        post_id: PostId,
        parent_id: CommentId,
        page: &PageSpec,
    ) -> Result<Page<CommentRecord>, AppError> {
        self.cache
            .get_or_load(
                Region::ChildComments,
                CacheKey::child_comments(post_id, parent_id, page.clone()),
                move || self.load_children(post_id, parent_id, page),
            )
            .await
    }

    async fn load_roots(
        &self,
        post_id: PostId,
        page: &PageSpec,
    ) -> Result<Page<CommentRecord>, AppError> {
        self.ensure_post(post_id).await?;
        Ok(self.reader.list_root_comments(post_id, page).await?)
    }

    async fn load_children(
        &self,
        post_id: PostId,
        parent_id: CommentId,
        page: &PageSpec,
    ) -> Result<Page<CommentRecord>, AppError> {
        self.ensure_comment(post_id, parent_id).await?;
        Ok(self
            .reader
            .list_child_comments(post_id, parent_id, page)
            .await?)
    }

    async fn ensure_post(&self, post_id: PostId) -> Result<(), AppError> {
        if self.posts.exists_post(post_id).await? {
            Ok(())
        } else {
            Err(DomainError::post_not_found(post_id).into())
        }
    }

    async fn ensure_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<(), AppError> {
        if self.reader.exists_comment(post_id, comment_id).await? {
            Ok(())
        } else {
            Err(DomainError::comment_not_found(comment_id).into())
        }
    }
}
