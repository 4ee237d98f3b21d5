//! Cache region and key definitions.
//!
//! A [`Region`] names one logical dataset. A [`CacheKey`] identifies an entry
//! inside a region; its shape depends on the region, and the accessors below
//! expose the identifying fields that invalidation predicates compare against.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::application::pagination::PageSpec;
use crate::domain::types::{CommentId, PostId, UserId};

/// Named cache datasets. Every region owns its entries exclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    /// Pages of root comments, keyed by `(post_id, page)`.
    RootComments,
    /// Pages of child comments, keyed by `(post_id, parent_id, page)`.
    ChildComments,
    /// Pages of the global post list, keyed by `page`.
    PostList,
    /// Single posts, keyed by `post_id`.
    PostItem,
    /// Single users, keyed by `user_id`.
    UserItem,
    /// Pages of a user's favourite posts, keyed by `(user_id, page)`.
    UserFavouritePosts,
    /// Pages of a user's authored posts, keyed by `(user_id, page)`.
    UserCreatedPosts,
    /// Uploaded image blobs, keyed by stored filename.
    PostImage,
    /// Uploaded user pictures, keyed by stored filename.
    UserPicture,
}

impl Region {
    pub const ALL: [Region; 9] = [
        Region::RootComments,
        Region::ChildComments,
        Region::PostList,
        Region::PostItem,
        Region::UserItem,
        Region::UserFavouritePosts,
        Region::UserCreatedPosts,
        Region::PostImage,
        Region::UserPicture,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Region::RootComments => "root_comments",
            Region::ChildComments => "child_comments",
            Region::PostList => "post_list",
            Region::PostItem => "post_item",
            Region::UserItem => "user_item",
            Region::UserFavouritePosts => "user_favourite_posts",
            Region::UserCreatedPosts => "user_created_posts",
            Region::PostImage => "post_image",
            Region::UserPicture => "user_picture",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown cache region `{0}`")]
pub struct UnknownRegion(pub String);

impl FromStr for Region {
    type Err = UnknownRegion;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Region::ALL
            .into_iter()
            .find(|region| region.name() == normalized)
            .ok_or_else(|| UnknownRegion(value.to_string()))
    }
}

/// Composite cache key. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Post(PostId),
    User(UserId),
    Image(String),
    PostPage(PageSpec),
    RootComments {
        post_id: PostId,
        page: PageSpec,
    },
    ChildComments {
        post_id: PostId,
        parent_id: CommentId,
        page: PageSpec,
    },
    UserPosts {
        user_id: UserId,
        page: PageSpec,
    },
}

impl CacheKey {
    pub fn root_comments(post_id: PostId, page: PageSpec) -> Self {
        Self::RootComments { post_id, page }
    }

    pub fn child_comments(post_id: PostId, parent_id: CommentId, page: PageSpec) -> Self {
        Self::ChildComments {
            post_id,
            parent_id,
            page,
        }
    }

    pub fn user_posts(user_id: UserId, page: PageSpec) -> Self {
        Self::UserPosts { user_id, page }
    }

    /// Post id carried by the key, if its shape has one.
    pub fn post_id(&self) -> Option<PostId> {
        match self {
            CacheKey::Post(id) => Some(*id),
            CacheKey::RootComments { post_id, .. } | CacheKey::ChildComments { post_id, .. } => {
                Some(*post_id)
            }
            _ => None,
        }
    }

    pub fn parent_id(&self) -> Option<CommentId> {
        match self {
            CacheKey::ChildComments { parent_id, .. } => Some(*parent_id),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            CacheKey::User(id) => Some(*id),
            CacheKey::UserPosts { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }

    pub fn page(&self) -> Option<&PageSpec> {
        match self {
            CacheKey::PostPage(page)
            | CacheKey::RootComments { page, .. }
            | CacheKey::ChildComments { page, .. }
            | CacheKey::UserPosts { page, .. } => Some(page),
            CacheKey::Post(_) | CacheKey::User(_) | CacheKey::Image(_) => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Post(id) => write!(f, "post:{id}"),
            CacheKey::User(id) => write!(f, "user:{id}"),
            CacheKey::Image(filename) => write!(f, "image:{filename}"),
            CacheKey::PostPage(page) => write!(f, "posts[{page}]"),
            CacheKey::RootComments { post_id, page } => {
                write!(f, "post:{post_id}/roots[{page}]")
            }
            CacheKey::ChildComments {
                post_id,
                parent_id,
                page,
            } => write!(f, "post:{post_id}/comment:{parent_id}/children[{page}]"),
            CacheKey::UserPosts { user_id, page } => write!(f, "user:{user_id}/posts[{page}]"),
        }
    }
}
