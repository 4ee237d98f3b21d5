//! Cache-consistency and hierarchical-deletion core for a content platform
//! with posts, threaded comments and user favourites.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
mod util;
