//! Identifier aliases shared across layers.
//!
//! Identifiers are database-style surrogate keys. They are plain integers so
//! that composite cache keys stay `Copy` and cheap to compare during
//! predicate scans.

pub type PostId = i64;
pub type CommentId = i64;
pub type UserId = i64;
