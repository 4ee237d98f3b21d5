//! Mutation events emitted by write paths after persistence commits.

use std::fmt;

use crate::domain::types::{CommentId, PostId, UserId};

/// A completed write that may have made cached data stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationEvent {
    CommentCreated {
        post_id: PostId,
        /// `None` for a root comment.
        parent_id: Option<CommentId>,
        comment_id: CommentId,
    },
    CommentUpdated {
        post_id: PostId,
        comment_id: CommentId,
    },
    /// Emitted once per requested subtree deletion, for the requested id only.
    CommentDeleted {
        post_id: PostId,
        comment_id: CommentId,
    },
    PostCreated {
        post_id: PostId,
        author_id: UserId,
    },
    PostUpdated {
        post_id: PostId,
        author_id: UserId,
    },
    PostDeleted {
        post_id: PostId,
        author_id: UserId,
    },
    FavouriteAdded {
        user_id: UserId,
        post_id: PostId,
    },
    FavouriteRemoved {
        user_id: UserId,
        post_id: PostId,
    },
    UserUpdated {
        user_id: UserId,
    },
    UserDeleted {
        user_id: UserId,
    },
}

impl MutationEvent {
    /// Short stable name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MutationEvent::CommentCreated { .. } => "comment_created",
            MutationEvent::CommentUpdated { .. } => "comment_updated",
            MutationEvent::CommentDeleted { .. } => "comment_deleted",
            MutationEvent::PostCreated { .. } => "post_created",
            MutationEvent::PostUpdated { .. } => "post_updated",
            MutationEvent::PostDeleted { .. } => "post_deleted",
            MutationEvent::FavouriteAdded { .. } => "favourite_added",
            MutationEvent::FavouriteRemoved { .. } => "favourite_removed",
            MutationEvent::UserUpdated { .. } => "user_updated",
            MutationEvent::UserDeleted { .. } => "user_deleted",
        }
    }
}

impl fmt::Display for MutationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationEvent::CommentCreated {
                post_id,
                parent_id: Some(parent_id),
                comment_id,
            } => write!(
                f,
                "{}(post={post_id}, parent={parent_id}, comment={comment_id})",
                self.kind()
            ),
            MutationEvent::CommentCreated {
                post_id,
                parent_id: None,
                comment_id,
            }
            | MutationEvent::CommentUpdated {
                post_id,
                comment_id,
            }
            | MutationEvent::CommentDeleted {
                post_id,
                comment_id,
            } => write!(f, "{}(post={post_id}, comment={comment_id})", self.kind()),
            MutationEvent::PostCreated { post_id, author_id }
            | MutationEvent::PostUpdated { post_id, author_id }
            | MutationEvent::PostDeleted { post_id, author_id } => {
                write!(f, "{}(post={post_id}, author={author_id})", self.kind())
            }
            MutationEvent::FavouriteAdded { user_id, post_id }
            | MutationEvent::FavouriteRemoved { user_id, post_id } => {
                write!(f, "{}(user={user_id}, post={post_id})", self.kind())
            }
            MutationEvent::UserUpdated { user_id } | MutationEvent::UserDeleted { user_id } => {
                write!(f, "{}(user={user_id})", self.kind())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_identifying_fields() {
        let event = MutationEvent::CommentCreated {
            post_id: 1,
            parent_id: Some(1),
            comment_id: 6,
        };
        assert_eq!(
            event.to_string(),
            "comment_created(post=1, parent=1, comment=6)"
        );

        let event = MutationEvent::FavouriteRemoved {
            user_id: 2,
            post_id: 9,
        };
        assert_eq!(event.to_string(), "favourite_removed(user=2, post=9)");
    }
}
