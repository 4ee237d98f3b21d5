//! Newsroom cache layer.
//!
//! Process-local, region-partitioned caching of read results with explicit
//! invalidation after every write:
//!
//! - [`CacheStore`] holds one concurrent map per [`Region`].
//! - [`InvalidationPolicy`] maps each [`MutationEvent`] to eviction actions.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! # optional allow-list; every region when omitted
//! regions = ["post_item", "post_list", "root_comments"]
//! ```

mod config;
mod events;
mod keys;
mod policy;
mod store;

pub use config::CacheConfig;
pub use events::MutationEvent;
pub use keys::{CacheKey, Region, UnknownRegion};
pub use policy::{EvictionAction, InvalidationPlan, InvalidationPolicy, KeyFilter};
pub use store::{CacheRegion, CacheStore, Cacheable, CachedValue};
