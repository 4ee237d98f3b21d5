//! Invalidation policy.
//!
//! Maps each [`MutationEvent`] to the eviction actions that keep every cache
//! region consistent with persistence. Regions whose keys carry the affected
//! identifier are evicted by predicate; regions whose keys do not (global post
//! lists, images) are cleared wholesale.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::types::{CommentId, PostId, UserId};

use super::events::MutationEvent;
use super::keys::{CacheKey, Region};
use super::store::CacheStore;

/// Identifier predicate applied to keys during a region scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFilter {
    Post(PostId),
    PostAndParent {
        post_id: PostId,
        parent_id: CommentId,
    },
    User(UserId),
}

impl KeyFilter {
    pub fn matches(&self, key: &CacheKey) -> bool {
        match *self {
            KeyFilter::Post(post_id) => key.post_id() == Some(post_id),
            KeyFilter::PostAndParent { post_id, parent_id } => {
                key.post_id() == Some(post_id) && key.parent_id() == Some(parent_id)
            }
            KeyFilter::User(user_id) => key.user_id() == Some(user_id),
        }
    }
}

impl fmt::Display for KeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFilter::Post(post_id) => write!(f, "post_id=={post_id}"),
            KeyFilter::PostAndParent { post_id, parent_id } => {
                write!(f, "post_id=={post_id} && parent_id=={parent_id}")
            }
            KeyFilter::User(user_id) => write!(f, "user_id=={user_id}"),
        }
    }
}

/// One store call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EvictionAction {
    Exact { region: Region, key: CacheKey },
    Where { region: Region, filter: KeyFilter },
    All { region: Region },
}

impl EvictionAction {
    fn exact(region: Region, key: CacheKey) -> Self {
        Self::Exact { region, key }
    }

    fn matching(region: Region, filter: KeyFilter) -> Self {
        Self::Where { region, filter }
    }

    fn all(region: Region) -> Self {
        Self::All { region }
    }

    pub fn region(&self) -> Region {
        match self {
            EvictionAction::Exact { region, .. }
            | EvictionAction::Where { region, .. }
            | EvictionAction::All { region } => *region,
        }
    }

    /// Run the action against the store, returning the number of evicted entries.
    pub fn execute(&self, store: &CacheStore) -> usize {
        match self {
            EvictionAction::Exact { region, key } => usize::from(store.evict_exact(*region, key)),
            EvictionAction::Where { region, filter } => {
                store.evict_where(*region, |key| filter.matches(key))
            }
            EvictionAction::All { region } => store.evict_all(*region),
        }
    }
}

impl fmt::Display for EvictionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionAction::Exact { region, key } => write!(f, "evict_exact({region}, {key})"),
            EvictionAction::Where { region, filter } => {
                write!(f, "evict_where({region}, {filter})")
            }
            EvictionAction::All { region } => write!(f, "evict_all({region})"),
        }
    }
}

/// Deduplicated actions for a batch of events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    actions: Vec<EvictionAction>,
}

impl InvalidationPlan {
    /// Merge the actions of several events.
    ///
    /// Duplicate actions collapse to one, and targeted actions on a region that
    /// is also cleared wholesale are dropped. First-seen order is kept.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a MutationEvent>) -> Self {
        let mut seen = HashSet::new();
        let actions: Vec<_> = events
            .into_iter()
            .flat_map(InvalidationPolicy::plan)
            .filter(|action| seen.insert(action.clone()))
            .collect();

        let cleared: BTreeSet<Region> = actions
            .iter()
            .filter_map(|action| match action {
                EvictionAction::All { region } => Some(*region),
                _ => None,
            })
            .collect();

        let actions = actions
            .into_iter()
            .filter(|action| {
                matches!(action, EvictionAction::All { .. }) || !cleared.contains(&action.region())
            })
            .collect();

        Self { actions }
    }

    pub fn actions(&self) -> &[EvictionAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn execute(&self, store: &CacheStore) -> usize {
        self.actions.iter().map(|action| action.execute(store)).sum()
    }
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvalidationPlan {{ ")?;
        for (index, action) in self.actions.iter().enumerate() {
            if index > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{action}")?;
        }
        write!(f, " }}")
    }
}

/// Executes the invalidation table against a shared [`CacheStore`].
#[derive(Clone)]
pub struct InvalidationPolicy {
    store: Arc<CacheStore>,
}

impl InvalidationPolicy {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Eviction actions required after `event`. Pure.
    pub fn plan(event: &MutationEvent) -> Vec<EvictionAction> {
        use EvictionAction as A;

        match *event {
            MutationEvent::CommentCreated {
                post_id,
                parent_id: None,
                ..
            } => vec![A::matching(Region::RootComments, KeyFilter::Post(post_id))],
            MutationEvent::CommentCreated {
                post_id,
                parent_id: Some(parent_id),
                ..
            } => vec![A::matching(
                Region::ChildComments,
                KeyFilter::PostAndParent { post_id, parent_id },
            )],
            MutationEvent::CommentUpdated { post_id, .. }
            | MutationEvent::CommentDeleted { post_id, .. } => vec![
                A::matching(Region::RootComments, KeyFilter::Post(post_id)),
                A::matching(Region::ChildComments, KeyFilter::Post(post_id)),
            ],
            MutationEvent::PostCreated { author_id, .. } => vec![
                A::all(Region::PostList),
                A::matching(Region::UserCreatedPosts, KeyFilter::User(author_id)),
            ],
            MutationEvent::PostUpdated { post_id, .. } => vec![
                A::exact(Region::PostItem, CacheKey::Post(post_id)),
                A::all(Region::PostList),
                A::all(Region::PostImage),
            ],
            MutationEvent::PostDeleted { post_id, .. } => vec![
                A::exact(Region::PostItem, CacheKey::Post(post_id)),
                A::all(Region::PostList),
                A::all(Region::PostImage),
                A::all(Region::UserCreatedPosts),
                A::all(Region::UserFavouritePosts),
            ],
            MutationEvent::FavouriteAdded { user_id, .. }
            | MutationEvent::FavouriteRemoved { user_id, .. } => vec![
                A::matching(Region::UserFavouritePosts, KeyFilter::User(user_id)),
                A::matching(Region::UserCreatedPosts, KeyFilter::User(user_id)),
            ],
            MutationEvent::UserUpdated { user_id } => {
                vec![A::exact(Region::UserItem, CacheKey::User(user_id))]
            }
            MutationEvent::UserDeleted { user_id } => vec![
                A::exact(Region::UserItem, CacheKey::User(user_id)),
                A::matching(Region::UserFavouritePosts, KeyFilter::User(user_id)),
                A::matching(Region::UserCreatedPosts, KeyFilter::User(user_id)),
                A::all(Region::UserPicture),
            ],
        }
    }

    /// Evict everything `event` may have made stale. Never fails.
    pub fn apply(&self, event: &MutationEvent) -> usize {
        let actions = Self::plan(event);
        let mut evicted = 0;
        for action in &actions {
            let removed = action.execute(&self.store);
            debug!(action = %action, evicted = removed, "Eviction action executed");
            evicted += removed;
        }

        info!(
            event = %event,
            actions = actions.len(),
            evicted,
            "Cache invalidated"
        );
        evicted
    }

    /// Apply several events through one merged plan.
    pub fn apply_all(&self, events: &[MutationEvent]) -> usize {
        let plan = InvalidationPlan::from_events(events);
        let evicted = plan.execute(&self.store);
        info!(
            events = events.len(),
            actions = plan.len(),
            evicted,
            "Cache invalidated from batch"
        );
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::{Page, PageSpec};
    use crate::cache::config::CacheConfig;
    use crate::cache::store::CachedValue;

    fn page(n: u32) -> PageSpec {
        PageSpec::new(n, 10).expect("valid page spec")
    }

    fn comments(spec: &PageSpec) -> CachedValue {
        CachedValue::CommentPage(Page::empty(spec))
    }

    fn posts(spec: &PageSpec) -> CachedValue {
        CachedValue::PostPage(Page::empty(spec))
    }

    fn policy() -> InvalidationPolicy {
        InvalidationPolicy::new(Arc::new(CacheStore::new(&CacheConfig::default())))
    }

    #[test]
    fn root_comment_creation_targets_post_roots() {
        let actions = InvalidationPolicy::plan(&MutationEvent::CommentCreated {
            post_id: 3,
            parent_id: None,
            comment_id: 10,
        });
        assert_eq!(
            actions,
            vec![EvictionAction::Where {
                region: Region::RootComments,
                filter: KeyFilter::Post(3),
            }]
        );
    }

    #[test]
    fn post_deletion_clears_unkeyed_regions() {
        let actions = InvalidationPolicy::plan(&MutationEvent::PostDeleted {
            post_id: 3,
            author_id: 1,
        });
        let regions: Vec<_> = actions.iter().map(EvictionAction::region).collect();
        assert_eq!(
            regions,
            vec![
                Region::PostItem,
                Region::PostList,
                Region::PostImage,
                Region::UserCreatedPosts,
                Region::UserFavouritePosts,
            ]
        );
        assert_eq!(
            actions[0],
            EvictionAction::Exact {
                region: Region::PostItem,
                key: CacheKey::Post(3),
            }
        );
    }

    #[test]
    fn child_comment_creation_evicts_only_that_parent() {
        let policy = policy();
        let store = policy.store();
        for (post_id, parent_id) in [(1, 1), (1, 2), (2, 1)] {
            for n in 0..2 {
                let spec = page(n);
                store.put(
                    Region::ChildComments,
                    CacheKey::child_comments(post_id, parent_id, spec.clone()),
                    comments(&spec),
                );
            }
        }
        store.put(
            Region::RootComments,
            CacheKey::root_comments(1, page(0)),
            comments(&page(0)),
        );

        let evicted = policy.apply(&MutationEvent::CommentCreated {
            post_id: 1,
            parent_id: Some(1),
            comment_id: 6,
        });

        assert_eq!(evicted, 2);
        assert!(!store.contains(Region::ChildComments, &CacheKey::child_comments(1, 1, page(0))));
        assert!(store.contains(Region::ChildComments, &CacheKey::child_comments(1, 2, page(0))));
        assert!(store.contains(Region::ChildComments, &CacheKey::child_comments(2, 1, page(1))));
        assert!(store.contains(Region::RootComments, &CacheKey::root_comments(1, page(0))));
    }

    #[test]
    fn favourite_change_touches_only_that_user() {
        let policy = policy();
        let store = policy.store();
        for user_id in [1, 2] {
            for region in [Region::UserFavouritePosts, Region::UserCreatedPosts] {
                store.put(region, CacheKey::user_posts(user_id, page(0)), posts(&page(0)));
            }
        }

        let evicted = policy.apply(&MutationEvent::FavouriteAdded {
            user_id: 1,
            post_id: 7,
        });

        assert_eq!(evicted, 2);
        assert_eq!(store.len(Region::UserFavouritePosts), 1);
        assert_eq!(store.len(Region::UserCreatedPosts), 1);
        assert!(store.contains(Region::UserFavouritePosts, &CacheKey::user_posts(2, page(0))));
    }

    #[test]
    fn user_deletion_evicts_item_and_user_pages() {
        let policy = policy();
        let store = policy.store();
        store.put(
            Region::UserItem,
            CacheKey::User(4),
            CachedValue::User(crate::domain::entities::UserRecord {
                id: 4,
                name: "Lin".to_string(),
                surname: "Yu".to_string(),
                username: "lin".to_string(),
                picture_url: None,
            }),
        );
        store.put(
            Region::UserCreatedPosts,
            CacheKey::user_posts(4, page(0)),
            posts(&page(0)),
        );
        store.put(
            Region::UserPicture,
            CacheKey::Image("face.png".to_string()),
            CachedValue::Image(bytes::Bytes::from_static(b"png")),
        );

        policy.apply(&MutationEvent::UserDeleted { user_id: 4 });

        assert!(store.is_empty(Region::UserItem));
        assert!(store.is_empty(Region::UserCreatedPosts));
        assert!(store.is_empty(Region::UserPicture));
    }

    #[test]
    fn plan_merges_duplicates_and_subsumed_actions() {
        let events = [
            MutationEvent::FavouriteAdded {
                user_id: 1,
                post_id: 2,
            },
            MutationEvent::FavouriteRemoved {
                user_id: 1,
                post_id: 3,
            },
            MutationEvent::PostDeleted {
                post_id: 2,
                author_id: 5,
            },
            MutationEvent::PostUpdated {
                post_id: 2,
                author_id: 5,
            },
        ];

        let plan = InvalidationPlan::from_events(&events);

        assert_eq!(
            plan.actions(),
            &[
                EvictionAction::Exact {
                    region: Region::PostItem,
                    key: CacheKey::Post(2),
                },
                EvictionAction::All {
                    region: Region::PostList
                },
                EvictionAction::All {
                    region: Region::PostImage
                },
                EvictionAction::All {
                    region: Region::UserCreatedPosts
                },
                EvictionAction::All {
                    region: Region::UserFavouritePosts
                },
            ]
        );
    }

    #[test]
    fn apply_on_disabled_store_is_silent() {
        let policy = InvalidationPolicy::new(Arc::new(CacheStore::disabled()));
        let evicted = policy.apply(&MutationEvent::PostDeleted {
            post_id: 1,
            author_id: 1,
        });
        assert_eq!(evicted, 0);
    }

    #[test]
    fn apply_all_matches_sequential_apply() {
        let batch = policy();
        let sequential = policy();
        for policy in [&batch, &sequential] {
            for post_id in [1, 2] {
                policy.store().put(
                    Region::RootComments,
                    CacheKey::root_comments(post_id, page(0)),
                    comments(&page(0)),
                );
            }
        }

        let events = [
            MutationEvent::CommentDeleted {
                post_id: 1,
                comment_id: 4,
            },
            MutationEvent::CommentUpdated {
                post_id: 1,
                comment_id: 5,
            },
        ];

        let batched = batch.apply_all(&events);
        let one_by_one: usize = events.iter().map(|event| sequential.apply(event)).sum();

        assert_eq!(batched, one_by_one);
        assert_eq!(
            batch.store().len(Region::RootComments),
            sequential.store().len(Region::RootComments)
        );
    }
}
