//! Hierarchical deletion of comment subtrees and posts.
//!
//! Every removal commits to persistence first and invalidates the cache
//! afterwards. Nothing is rolled back: if storage fails halfway through a
//! subtree, the rows already removed stay removed and the error propagates.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::comment_tree::CommentTree;
use crate::application::repos::{
    CommentsRepo, CommentsWriteRepo, ImageStore, PostsRepo, PostsWriteRepo, RepoError,
};
use crate::cache::{InvalidationPolicy, MutationEvent};
use crate::domain::types::{CommentId, PostId};

const METRIC_SUBTREE_DELETE_MS: &str = "newsroom_comment_subtree_delete_ms";

#[derive(Debug, Error)]
pub enum DeletionError {
    #[error("comment `{comment_id}` not found under post `{post_id}`")]
    CommentNotFound {
        post_id: PostId,
        comment_id: CommentId,
    },
    #[error("post `{0}` not found")]
    PostNotFound(PostId),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Outcome of a completed post deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDeletion {
    pub post_id: PostId,
    pub removed_comments: usize,
    pub image_removed: bool,
}

#[derive(Clone)]
pub struct DeletionCoordinator {
    posts: Arc<dyn PostsRepo>,
    posts_writer: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    comments_writer: Arc<dyn CommentsWriteRepo>,
    images: Arc<dyn ImageStore>,
    tree: CommentTree,
    invalidation: InvalidationPolicy,
}

impl DeletionCoordinator {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_writer: Arc<dyn PostsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        comments_writer: Arc<dyn CommentsWriteRepo>,
        images: Arc<dyn ImageStore>,
        invalidation: InvalidationPolicy,
    ) -> Self {
        let tree = CommentTree::new(comments.clone());
        Self {
            posts,
            posts_writer,
            comments,
            comments_writer,
            images,
            tree,
            invalidation,
        }
    }

    /// Delete `comment_id` and all of its descendants, leaves first.
    ///
    /// Returns the removed ids in removal order. Exactly one
    /// [`MutationEvent::CommentDeleted`] is applied, for `comment_id`.
    pub async fn delete_comment_subtree(
        &self,
        post_id: PostId,
        comment_id: CommentId,
    ) -> Result<Vec<CommentId>, DeletionError> {
        if !self.comments.exists_comment(post_id, comment_id).await? {
            debug!(post_id, comment_id, "Comment to delete does not exist");
            return Err(DeletionError::CommentNotFound {
                post_id,
                comment_id,
            });
        }

        let started = Instant::now();
        let mut removed = Vec::new();
        let outcome = self.remove_subtree(post_id, comment_id, &mut removed).await;
        histogram!(METRIC_SUBTREE_DELETE_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        if !removed.is_empty() {
            self.invalidation.apply(&MutationEvent::CommentDeleted {
                post_id,
                comment_id,
            });
        }

        match outcome {
            Ok(()) => {
                info!(
                    post_id,
                    comment_id,
                    removed = removed.len(),
                    "Comment subtree deleted"
                );
                Ok(removed)
            }
            Err(err) => {
                warn!(
                    post_id,
                    comment_id,
                    removed = removed.len(),
                    error = %err,
                    "Comment subtree deletion aborted"
                );
                Err(err.into())
            }
        }
    }

    /// Delete a post, every comment under it, and its stored image.
    pub async fn delete_post(&self, post_id: PostId) -> Result<PostDeletion, DeletionError> {
        let Some(post) = self.posts.find_post(post_id).await? else {
            return Err(DeletionError::PostNotFound(post_id));
        };

        let mut removed_comments = 0;
        for root in self.tree.roots_of(post_id).await? {
            let removed = self.delete_comment_subtree(post_id, root).await?;
            removed_comments += removed.len();
        }
        debug!(post_id, removed_comments, phase = "comments", "Post comments removed");

        self.posts_writer.delete_post(post_id).await?;
        debug!(post_id, phase = "row", "Post row removed");

        let image_removed = match post.image_filename() {
            Some(filename) => match self.images.delete_if_exists(filename).await {
                Ok(removed) => removed,
                Err(err) => {
                    warn!(post_id, filename, error = %err, "Failed to remove post image");
                    false
                }
            },
            None => false,
        };

        self.invalidation.apply(&MutationEvent::PostDeleted {
            post_id,
            author_id: post.author_id,
        });

        info!(post_id, removed_comments, image_removed, "Post deleted");
        Ok(PostDeletion {
            post_id,
            removed_comments,
            image_removed,
        })
    }

    async fn remove_subtree(
        &self,
        post_id: PostId,
        root: CommentId,
        removed: &mut Vec<CommentId>,
    ) -> Result<(), RepoError> {
        let mut walk = self.tree.walk(post_id, root);
        while let Some(id) = walk.next().await? {
            self.comments_writer.delete_comment(id).await?;
            debug!(post_id, comment_id = id, "Comment removed");
            removed.push(id);
        }
        Ok(())
    }
}
