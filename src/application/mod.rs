//! Application services: cache-aware reads, writes and cascading deletion.

pub mod comment_tree;
pub mod comments;
pub mod context;
pub mod deletion;
pub mod error;
pub mod pagination;
pub mod posts;
pub mod repos;
pub mod users;
pub mod validation;
