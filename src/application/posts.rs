//! Post reads and writes.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use crate::application::deletion::{DeletionCoordinator, PostDeletion};
use crate::application::error::AppError;
use crate::application::pagination::{Page, PageSpec};
use crate::application::repos::{
    CreatePostParams, ImageStore, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
    UsersRepo,
};
use crate::application::validation::ensure_non_empty;
use crate::cache::{CacheKey, CacheStore, InvalidationPolicy, MutationEvent, Region};
use crate::domain::entities::{PostRecord, PostSummary, last_path_segment};
use crate::domain::error::DomainError;
use crate::domain::types::{PostId, UserId};

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub title: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub content: String,
    pub author_id: UserId,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostCommand {
    pub id: PostId,
    pub title: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub content: String,
    pub image_url: Option<String>,
}

fn normalize_tags(tags: BTreeSet<String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn title_conflict(err: RepoError) -> AppError {
    match err {
        RepoError::Duplicate { .. } => DomainError::conflict("post", "title").into(),
        other => other.into(),
    }
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    users: Arc<dyn UsersRepo>,
    images: Arc<dyn ImageStore>,
    cache: Arc<CacheStore>,
    invalidation: InvalidationPolicy,
    deletion: DeletionCoordinator,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        users: Arc<dyn UsersRepo>,
        images: Arc<dyn ImageStore>,
        invalidation: InvalidationPolicy,
        deletion: DeletionCoordinator,
    ) -> Self {
        Self {
            reader,
            writer,
            users,
            images,
            cache: invalidation.store().clone(),
            invalidation,
            deletion,
        }
    }

    pub async fn create_post(&self, command: CreatePostCommand) -> Result<PostRecord, AppError> {
        ensure_non_empty(&command.title, "title")?;
        ensure_non_empty(&command.content, "content")?;

        if !self.users.exists_user(command.author_id).await? {
            return Err(DomainError::user_not_found(command.author_id).into());
        }
        if self.reader.exists_by_title(&command.title).await? {
            return Err(DomainError::conflict("post", "title").into());
        }

        let post = self
            .writer
            .create_post(CreatePostParams {
                title: command.title,
                description: command.description,
                tags: normalize_tags(command.tags),
                content: command.content,
                author_id: command.author_id,
                image_url: command.image_url,
            })
            .await
            .map_err(title_conflict)?;

        self.invalidation.apply(&MutationEvent::PostCreated {
            post_id: post.id,
            author_id: post.author_id,
        });
        info!(post_id = post.id, author_id = post.author_id, "Post created");
        Ok(post)
    }

    pub async fn get_post(&self, id: PostId) -> Result<PostRecord, AppError> {
        self.cache
            .get_or_load(Region::PostItem, CacheKey::Post(id), move || {
                self.load_post(id)
            })
            .await
    }

    pub async fn list_posts(&self, page: &PageSpec) -> Result<Page<PostSummary>, AppError> {
        self.cache
            .get_or_load(Region::PostList, CacheKey::PostPage(page.clone()), move || {
                self.load_post_page(page)
            })
            .await
    }

    pub async fn update_post(&self, command: UpdatePostCommand) -> Result<PostRecord, AppError> {
        ensure_non_empty(&command.title, "title")?;
        ensure_non_empty(&command.content, "content")?;

        let existing = self
            .reader
            .find_post(command.id)
            .await?
            .ok_or_else(|| DomainError::post_not_found(command.id))?;

        if existing.title != command.title && self.reader.exists_by_title(&command.title).await? {
            return Err(DomainError::conflict("post", "title").into());
        }

        let post = self
            .writer
            .update_post(UpdatePostParams {
                id: command.id,
                title: command.title,
                description: command.description,
                tags: normalize_tags(command.tags),
                content: command.content,
                image_url: command.image_url,
            })
            .await
            .map_err(title_conflict)?;

        let replaced = existing
            .image_filename()
            .filter(|old| post.image_filename() != Some(*old));
        if let Some(filename) = replaced {
            if let Err(err) = self.images.delete_if_exists(filename).await {
                warn!(post_id = post.id, filename, error = %err, "Failed to remove replaced image");
            }
        }

        self.invalidation.apply(&MutationEvent::PostUpdated {
            post_id: post.id,
            author_id: post.author_id,
        });
        info!(post_id = post.id, "Post updated");
        Ok(post)
    }

    pub async fn delete_post(&self, id: PostId) -> Result<PostDeletion, AppError> {
        Ok(self.deletion.delete_post(id).await?)
    }

    /// Store an uploaded image and return its stored filename.
    pub async fn upload_image(
        &self,
        original_name: &str,
        payload: Bytes,
    ) -> Result<String, AppError> {
        let filename = self.images.store(original_name, payload).await?;
        info!(filename, "Post image uploaded");
        Ok(filename)
    }

    /// Image bytes by stored filename or full image URL.
    pub async fn get_image(&self, name: &str) -> Result<Bytes, AppError> {
        let filename = last_path_segment(name)
            .ok_or_else(|| DomainError::ImageNotFound(name.to_string()))?
            .to_string();

        self.cache
            .get_or_load(Region::PostImage, CacheKey::Image(filename.clone()), move || {
                self.load_image(filename)
            })
            .await
    }

    async fn load_post(&self, id: PostId) -> Result<PostRecord, AppError> {
        self.reader
            .find_post(id)
            .await?
            .ok_or_else(|| DomainError::post_not_found(id).into())
    }

    async fn load_post_page(&self, page: &PageSpec) -> Result<Page<PostSummary>, AppError> {
        Ok(self.reader.list_posts(page).await?)
    }

    async fn load_image(&self, filename: String) -> Result<Bytes, AppError> {
        self.images
            .load(&filename)
            .await?
            .ok_or_else(|| DomainError::ImageNotFound(filename).into())
    }
}
