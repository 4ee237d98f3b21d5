//! User profile, favourites and account removal.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use crate::application::deletion::DeletionCoordinator;
use crate::application::error::AppError;
use crate::application::pagination::{Page, PageSpec};
use crate::application::repos::{
    ImageStore, PostsRepo, RepoError, UpdateUserParams, UsersRepo, UsersWriteRepo,
};
use crate::application::validation::ensure_non_empty;
use crate::cache::{CacheKey, CacheStore, InvalidationPolicy, MutationEvent, Region};
use crate::domain::entities::{PostSummary, UserRecord, last_path_segment};
use crate::domain::error::DomainError;
use crate::domain::types::{PostId, UserId};

#[derive(Debug, Clone)]
pub struct UpdateUserCommand {
    pub id: UserId,
    pub name: String,
    pub surname: String,
    pub username: String,
    pub picture_url: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    reader: Arc<dyn UsersRepo>,
    writer: Arc<dyn UsersWriteRepo>,
    posts: Arc<dyn PostsRepo>,
    pictures: Arc<dyn ImageStore>,
    cache: Arc<CacheStore>,
    invalidation: InvalidationPolicy,
    deletion: DeletionCoordinator,
}

impl UserService {
    pub fn new(
        reader: Arc<dyn UsersRepo>,
        writer: Arc<dyn UsersWriteRepo>,
        posts: Arc<dyn PostsRepo>,
        pictures: Arc<dyn ImageStore>,
        invalidation: InvalidationPolicy,
        deletion: DeletionCoordinator,
    ) -> Self {
        Self {
            reader,
            writer,
            posts,
            pictures,
            cache: invalidation.store().clone(),
            invalidation,
            deletion,
        }
    }

    pub async fn get_user(&self, id: UserId) -> Result<UserRecord, AppError> {
        self.cache
            .get_or_load(Region::UserItem, CacheKey::User(id), move || {
                self.load_user(id)
            })
            .await
    }

    pub async fn update_user(&self, command: UpdateUserCommand) -> Result<UserRecord, AppError> {
        ensure_non_empty(&command.username, "username")?;

        let existing = self.load_user(command.id).await?;
        if existing.username != command.username
            && self.reader.exists_by_username(&command.username).await?
        {
            return Err(DomainError::conflict("user", "username").into());
        }

        let user = self
            .writer
            .update_user(UpdateUserParams {
                id: command.id,
                name: command.name,
                surname: command.surname,
                username: command.username,
                picture_url: command.picture_url,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => DomainError::conflict("user", "username").into(),
                other => AppError::from(other),
            })?;

        self.invalidation
            .apply(&MutationEvent::UserUpdated { user_id: user.id });
        info!(user_id = user.id, "User updated");
        Ok(user)
    }

    pub async fn add_favourite(&self, user_id: UserId, post_id: PostId) -> Result<(), AppError> {
        self.ensure_user_and_post(user_id, post_id).await?;

        self.writer
            .add_favourite(user_id, post_id)
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => DomainError::conflict("favourite", "post").into(),
                other => AppError::from(other),
            })?;

        self.invalidation
            .apply(&MutationEvent::FavouriteAdded { user_id, post_id });
        info!(user_id, post_id, "Favourite added");
        Ok(())
    }

    /// Removing a favourite that is not there succeeds and still invalidates.
    pub async fn remove_favourite(&self, user_id: UserId, post_id: PostId) -> Result<(), AppError> {
        self.ensure_user(user_id).await?;

        let removed = self.writer.remove_favourite(user_id, post_id).await?;

        self.invalidation
            .apply(&MutationEvent::FavouriteRemoved { user_id, post_id });
        info!(user_id, post_id, removed, "Favourite removed");
        Ok(())
    }

    pub async fn list_favourite_posts(
        &self,
        user_id: UserId,
        page: &PageSpec,
    ) -> Result<Page<PostSummary>, AppError> {
        self.cache
            .get_or_load(
                Region::UserFavouritePosts,
                CacheKey::user_posts(user_id, page.clone()),
                move || self.load_favourites(user_id, page),
            )
            .await
    }

    pub async fn list_created_posts(
        &self,
        user_id: UserId,
        page: &PageSpec,
    ) -> Result<Page<PostSummary>, AppError> {
        self.cache
            .get_or_load(
                Region::UserCreatedPosts,
                CacheKey::user_posts(user_id, page.clone()),
                move || self.load_created(user_id, page),
            )
            .await
    }

    /// Store an uploaded profile picture and return its stored filename.
    pub async fn upload_user_picture(
        &self,
        original_name: &str,
        payload: Bytes,
    ) -> Result<String, AppError> {
        let filename = self.pictures.store(original_name, payload).await?;
        info!(filename, "User picture uploaded");
        Ok(filename)
    }

    /// Picture bytes by stored filename or full picture URL.
    pub async fn get_user_picture(&self, name: &str) -> Result<Bytes, AppError> {
        let filename = last_path_segment(name)
            .ok_or_else(|| DomainError::ImageNotFound(name.to_string()))?
            .to_string();

        self.cache
            .get_or_load(
                Region::UserPicture,
                CacheKey::Image(filename.clone()),
                move || self.load_picture(filename),
            )
            .await
    }

    /// Remove the user's posts (with their comments and images), then the user
    /// and their stored picture.
    pub async fn delete_user(&self, user_id: UserId) -> Result<(), AppError> {
        let user = self.load_user(user_id).await?;

        let post_ids = self.posts.post_ids_by_author(user_id).await?;
        for post_id in &post_ids {
            self.deletion.delete_post(*post_id).await?;
        }

        self.writer.delete_user(user_id).await?;

        let picture_removed = match user.picture_filename() {
            Some(filename) => match self.pictures.delete_if_exists(filename).await {
                Ok(removed) => removed,
                Err(err) => {
                    warn!(user_id, filename, error = %err, "Failed to remove user picture");
                    false
                }
            },
            None => false,
        };

        self.invalidation
            .apply(&MutationEvent::UserDeleted { user_id });
        info!(
            user_id,
            removed_posts = post_ids.len(),
            picture_removed,
            "User deleted"
        );
        Ok(())
    }

    async fn load_user(&self, id: UserId) -> Result<UserRecord, AppError> {
        self.reader
            .find_user(id)
            .await?
            .ok_or_else(|| DomainError::user_not_found(id).into())
    }

    async fn load_picture(&self, filename: String) -> Result<Bytes, AppError> {
        self.pictures
            .load(&filename)
            .await?
            .ok_or_else(|| DomainError::ImageNotFound(filename).into())
    }

    async fn load_favourites(
        &self,
        user_id: UserId,
        page: &PageSpec,
    ) -> Result<Page<PostSummary>, AppError> {
        self.ensure_user(user_id).await?;
        Ok(self.reader.list_favourite_posts(user_id, page).await?)
    }

    async fn load_created(
        &self,
        user_id: UserId,
        page: &PageSpec,
    ) -> Result<Page<PostSummary>, AppError> {
        self.ensure_user(user_id).await?;
        Ok(self.posts.list_posts_by_author(user_id, page).await?)
    }

    async fn ensure_user(&self, user_id: UserId) -> Result<(), AppError> {
        if self.reader.exists_user(user_id).await? {
            Ok(())
        } else {
            Err(DomainError::user_not_found(user_id).into())
        }
    }

    async fn ensure_user_and_post(&self, user_id: UserId, post_id: PostId) -> Result<(), AppError> {
        self.ensure_user(user_id).await?;
        if self.posts.exists_post(post_id).await? {
            Ok(())
        } else {
            Err(DomainError::post_not_found(post_id).into())
        }
    }
}
