//! In-memory persistence adapter.
//!
//! Implements every repository trait over a single lock-protected state and
//! enforces the referential rules a relational schema would: comments need an
//! existing post and parent, and rows that are still referenced cannot be
//! removed.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::pagination::{Page, PageSpec, SortDirection};
use crate::application::repos::{
    CommentsRepo, CommentsWriteRepo, CreateCommentParams, CreatePostParams, PostsRepo,
    PostsWriteRepo, RepoError, UpdatePostParams, UpdateUserParams, UsersRepo, UsersWriteRepo,
};
use crate::domain::entities::{CommentRecord, PostRecord, PostSummary, UserRecord};
use crate::domain::types::{CommentId, PostId, UserId};
use crate::util::lock::{rw_read, rw_write};

const SOURCE: &str = "infra::memory";

#[derive(Debug, Default)]
struct State {
    next_post_id: PostId,
    next_comment_id: CommentId,
    next_user_id: UserId,
    posts: BTreeMap<PostId, PostRecord>,
    comments: BTreeMap<CommentId, CommentRecord>,
    users: BTreeMap<UserId, UserRecord>,
    favourites: BTreeSet<(UserId, PostId)>,
}

impl State {
    fn has_children(&self, id: CommentId) -> bool {
        self.comments
            .values()
            .any(|comment| comment.parent_id == Some(id))
    }

    fn username_taken(&self, username: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|user| user.username == username && Some(user.id) != except)
    }

    fn title_taken(&self, title: &str, except: Option<PostId>) -> bool {
        self.posts
            .values()
            .any(|post| post.title == title && Some(post.id) != except)
    }

    fn comment_ids(&self, post_id: PostId, parent_id: Option<CommentId>) -> Vec<CommentId> {
        self.comments
            .values()
            .filter(|comment| comment.post_id == post_id && comment.parent_id == parent_id)
            .map(|comment| comment.id)
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user. Accounts are provisioned outside the write services.
    pub fn create_user(
        &self,
        name: &str,
        surname: &str,
        username: &str,
    ) -> Result<UserRecord, RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "create_user");
        if state.username_taken(username, None) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }

        state.next_user_id += 1;
        let user = UserRecord {
            id: state.next_user_id,
            name: name.to_string(),
            surname: surname.to_string(),
            username: username.to_string(),
            picture_url: None,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Ids of every comment stored under `post_id`, in id order.
    pub fn comments_of_post(&self, post_id: PostId) -> Vec<CommentId> {
        rw_read(&self.state, SOURCE, "comments_of_post")
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| comment.id)
            .collect()
    }

    pub fn comment_count(&self) -> usize {
        rw_read(&self.state, SOURCE, "comment_count").comments.len()
    }

    pub fn is_favourite(&self, user_id: UserId, post_id: PostId) -> bool {
        rw_read(&self.state, SOURCE, "is_favourite")
            .favourites
            .contains(&(user_id, post_id))
    }
}

fn compare_posts(a: &PostRecord, b: &PostRecord, spec: &PageSpec) -> Result<Ordering, RepoError> {
    for directive in spec.sort() {
        let ordering = match directive.property.as_str() {
            "id" => a.id.cmp(&b.id),
            "title" => a.title.cmp(&b.title),
            "created_at" | "createdAt" => a.created_at.cmp(&b.created_at),
            other => {
                return Err(RepoError::from_persistence(format!(
                    "unknown sort property `{other}` for posts"
                )));
            }
        };
        let ordering = match directive.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(a.id.cmp(&b.id))
}

fn compare_comments(
    a: &CommentRecord,
    b: &CommentRecord,
    spec: &PageSpec,
) -> Result<Ordering, RepoError> {
    for directive in spec.sort() {
        let ordering = match directive.property.as_str() {
            "id" => a.id.cmp(&b.id),
            "created_at" | "createdAt" => a.created_at.cmp(&b.created_at),
            other => {
                return Err(RepoError::from_persistence(format!(
                    "unknown sort property `{other}` for comments"
                )));
            }
        };
        let ordering = match directive.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(a.id.cmp(&b.id))
}

fn sorted<T: Clone>(
    mut items: Vec<&T>,
    spec: &PageSpec,
    compare: fn(&T, &T, &PageSpec) -> Result<Ordering, RepoError>,
) -> Result<Vec<T>, RepoError> {
    let mut failure = None;
    items.sort_by(|a, b| {
        compare(a, b, spec).unwrap_or_else(|err| {
            failure.get_or_insert(err);
            Ordering::Equal
        })
    });
    if let Some(err) = failure {
        return Err(err);
    }
    Ok(items.into_iter().cloned().collect())
}

fn paginate<T>(items: Vec<T>, spec: &PageSpec) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(spec.offset())
        .take(spec.size() as usize)
        .collect();
    Page::new(items, spec, total)
}

fn post_page<'a>(
    posts: impl Iterator<Item = &'a PostRecord>,
    spec: &PageSpec,
) -> Result<Page<PostSummary>, RepoError> {
    let posts = sorted(posts.collect(), spec, compare_posts)?;
    Ok(paginate(
        posts.iter().map(PostRecord::summary).collect(),
        spec,
    ))
}

#[async_trait]
impl PostsRepo for InMemoryStore {
    async fn exists_post(&self, id: PostId) -> Result<bool, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "exists_post")
            .posts
            .contains_key(&id))
    }

    async fn exists_by_title(&self, title: &str) -> Result<bool, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "exists_by_title").title_taken(title, None))
    }

    async fn find_post(&self, id: PostId) -> Result<Option<PostRecord>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "find_post")
            .posts
            .get(&id)
            .cloned())
    }

    async fn list_posts(&self, page: &PageSpec) -> Result<Page<PostSummary>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "list_posts");
        post_page(state.posts.values(), page)
    }

    async fn list_posts_by_author(
        &self,
        author_id: UserId,
        page: &PageSpec,
    ) -> Result<Page<PostSummary>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "list_posts_by_author");
        post_page(
            state.posts.values().filter(|post| post.author_id == author_id),
            page,
        )
    }

    async fn post_ids_by_author(&self, author_id: UserId) -> Result<Vec<PostId>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "post_ids_by_author")
            .posts
            .values()
            .filter(|post| post.author_id == author_id)
            .map(|post| post.id)
            .collect())
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "create_post");
        if !state.users.contains_key(&params.author_id) {
            return Err(RepoError::integrity(format!(
                "post author `{}` does not exist",
                params.author_id
            )));
        }
        if state.title_taken(&params.title, None) {
            return Err(RepoError::Duplicate {
                constraint: "posts_title_key".to_string(),
            });
        }

        state.next_post_id += 1;
        let post = PostRecord {
            id: state.next_post_id,
            title: params.title,
            description: params.description,
            tags: params.tags,
            content: params.content,
            author_id: params.author_id,
            image_url: params.image_url,
            created_at: OffsetDateTime::now_utc(),
        };
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "update_post");
        if state.title_taken(&params.title, Some(params.id)) {
            return Err(RepoError::Duplicate {
                constraint: "posts_title_key".to_string(),
            });
        }

        let post = state.posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        post.title = params.title;
        post.description = params.description;
        post.tags = params.tags;
        post.content = params.content;
        post.image_url = params.image_url;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: PostId) -> Result<(), RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "delete_post");
        if !state.posts.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        if state.comments.values().any(|comment| comment.post_id == id) {
            return Err(RepoError::integrity(format!(
                "post `{id}` is still referenced by comments"
            )));
        }

        state.favourites.retain(|(_, post_id)| *post_id != id);
        state.posts.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for InMemoryStore {
    async fn exists_comment(&self, post_id: PostId, id: CommentId) -> Result<bool, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "exists_comment")
            .comments
            .get(&id)
            .is_some_and(|comment| comment.post_id == post_id))
    }

    async fn root_comment_ids(&self, post_id: PostId) -> Result<Vec<CommentId>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "root_comment_ids").comment_ids(post_id, None))
    }

    async fn child_comment_ids(
        &self,
        post_id: PostId,
        parent_id: CommentId,
    ) -> Result<Vec<CommentId>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "child_comment_ids").comment_ids(post_id, Some(parent_id)))
    }

    async fn list_root_comments(
        &self,
        post_id: PostId,
        page: &PageSpec,
    ) -> Result<Page<CommentRecord>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "list_root_comments");
        let comments = state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id && comment.parent_id.is_none())
            .collect();
        Ok(paginate(sorted(comments, page, compare_comments)?, page))
    }

    async fn list_child_comments(
        &self,
        post_id: PostId,
        parent_id: CommentId,
        page: &PageSpec,
    ) -> Result<Page<CommentRecord>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "list_child_comments");
        let comments = state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id && comment.parent_id == Some(parent_id))
            .collect();
        Ok(paginate(sorted(comments, page, compare_comments)?, page))
    }
}

#[async_trait]
impl CommentsWriteRepo for InMemoryStore {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "create_comment");
        if !state.posts.contains_key(&params.post_id) {
            return Err(RepoError::integrity(format!(
                "post `{}` does not exist",
                params.post_id
            )));
        }
        if !state.users.contains_key(&params.author_id) {
            return Err(RepoError::integrity(format!(
                "comment author `{}` does not exist",
                params.author_id
            )));
        }
        if let Some(parent_id) = params.parent_id {
            let same_post = state
                .comments
                .get(&parent_id)
                .is_some_and(|parent| parent.post_id == params.post_id);
            if !same_post {
                return Err(RepoError::integrity(format!(
                    "parent comment `{parent_id}` does not belong to post `{}`",
                    params.post_id
                )));
            }
        }

        state.next_comment_id += 1;
        let comment = CommentRecord {
            id: state.next_comment_id,
            post_id: params.post_id,
            parent_id: params.parent_id,
            author_id: params.author_id,
            content: params.content,
            created_at: OffsetDateTime::now_utc(),
        };
        state.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn update_comment(
        &self,
        post_id: PostId,
        id: CommentId,
        content: String,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "update_comment");
        let comment = state
            .comments
            .get_mut(&id)
            .filter(|comment| comment.post_id == post_id)
            .ok_or(RepoError::NotFound)?;
        comment.content = content;
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "delete_comment");
        if !state.comments.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        if state.has_children(id) {
            return Err(RepoError::integrity(format!(
                "comment `{id}` still has replies"
            )));
        }
        state.comments.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for InMemoryStore {
    async fn exists_user(&self, id: UserId) -> Result<bool, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "exists_user")
            .users
            .contains_key(&id))
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "exists_by_username").username_taken(username, None))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserRecord>, RepoError> {
        Ok(rw_read(&self.state, SOURCE, "find_user")
            .users
            .get(&id)
            .cloned())
    }

    async fn list_favourite_posts(
        &self,
        user_id: UserId,
        page: &PageSpec,
    ) -> Result<Page<PostSummary>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "list_favourite_posts");
        let posts = state
            .favourites
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .filter_map(|(_, post_id)| state.posts.get(post_id));
        post_page(posts, page)
    }
}

#[async_trait]
impl UsersWriteRepo for InMemoryStore {
    async fn update_user(&self, params: UpdateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "update_user");
        if state.username_taken(&params.username, Some(params.id)) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }

        let user = state.users.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        user.name = params.name;
        user.surname = params.surname;
        user.username = params.username;
        user.picture_url = params.picture_url;
        Ok(user.clone())
    }

    async fn add_favourite(&self, user_id: UserId, post_id: PostId) -> Result<(), RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "add_favourite");
        if !state.users.contains_key(&user_id) || !state.posts.contains_key(&post_id) {
            return Err(RepoError::integrity(format!(
                "favourite ({user_id}, {post_id}) references a missing row"
            )));
        }
        if !state.favourites.insert((user_id, post_id)) {
            return Err(RepoError::Duplicate {
                constraint: "favourites_pkey".to_string(),
            });
        }
        Ok(())
    }

    async fn remove_favourite(
        &self,
        user_id: UserId,
        post_id: PostId,
    ) -> Result<bool, RepoError> {
        Ok(rw_write(&self.state, SOURCE, "remove_favourite")
            .favourites
            .remove(&(user_id, post_id)))
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "delete_user");
        if !state.users.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        if state.posts.values().any(|post| post.author_id == id) {
            return Err(RepoError::integrity(format!(
                "user `{id}` still authors posts"
            )));
        }

        state.favourites.retain(|(user_id, _)| *user_id != id);
        state.users.remove(&id);
        Ok(())
    }
}
