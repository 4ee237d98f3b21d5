//! Service wiring. Every dependency is passed in explicitly.

use std::sync::Arc;

use crate::application::comments::CommentService;
use crate::application::deletion::DeletionCoordinator;
use crate::application::posts::PostService;
use crate::application::repos::{
    CommentsRepo, CommentsWriteRepo, ImageStore, PostsRepo, PostsWriteRepo, UsersRepo,
    UsersWriteRepo,
};
use crate::application::users::UserService;
use crate::cache::{CacheConfig, CacheStore, InvalidationPolicy};

#[derive(Clone)]
pub struct Repositories {
    pub posts: Arc<dyn PostsRepo>,
    pub posts_writer: Arc<dyn PostsWriteRepo>,
    pub comments: Arc<dyn CommentsRepo>,
    pub comments_writer: Arc<dyn CommentsWriteRepo>,
    pub users: Arc<dyn UsersRepo>,
    pub users_writer: Arc<dyn UsersWriteRepo>,
}

impl Repositories {
    /// Use one adapter for every repository role.
    pub fn from_shared<R>(repo: Arc<R>) -> Self
    where
        R: PostsRepo
            + PostsWriteRepo
            + CommentsRepo
            + CommentsWriteRepo
            + UsersRepo
            + UsersWriteRepo
            + 'static,
    {
        Self {
            posts: repo.clone(),
            posts_writer: repo.clone(),
            comments: repo.clone(),
            comments_writer: repo.clone(),
            users: repo.clone(),
            users_writer: repo,
        }
    }
}

#[derive(Clone)]
pub struct AppContext {
    pub cache: Arc<CacheStore>,
    pub invalidation: InvalidationPolicy,
    pub deletion: DeletionCoordinator,
    pub posts: PostService,
    pub comments: CommentService,
    pub users: UserService,
}

impl AppContext {
    /// `images` holds post images, `pictures` holds user pictures.
    pub fn new(
        repos: Repositories,
        images: Arc<dyn ImageStore>,
        pictures: Arc<dyn ImageStore>,
        cache: &CacheConfig,
    ) -> Self {
        let cache = Arc::new(CacheStore::new(cache));
        let invalidation = InvalidationPolicy::new(cache.clone());
        let deletion = DeletionCoordinator::new(
            repos.posts.clone(),
            repos.posts_writer.clone(),
            repos.comments.clone(),
            repos.comments_writer.clone(),
            images.clone(),
            invalidation.clone(),
        );

        let posts = PostService::new(
            repos.posts.clone(),
            repos.posts_writer.clone(),
            repos.users.clone(),
            images,
            invalidation.clone(),
            deletion.clone(),
        );
        let comments = CommentService::new(
            repos.comments.clone(),
            repos.comments_writer.clone(),
            repos.posts.clone(),
            repos.users.clone(),
            invalidation.clone(),
            deletion.clone(),
        );
        let users = UserService::new(
            repos.users,
            repos.users_writer,
            repos.posts,
            pictures,
            invalidation.clone(),
            deletion.clone(),
        );

        Self {
            cache,
            invalidation,
            deletion,
            posts,
            comments,
            users,
        }
    }
}
