//! Region-partitioned cache storage.
//!
//! Each [`Region`] is backed by its own sharded concurrent map, so unrelated
//! regions and keys never contend on a shared lock. Regions carry no capacity
//! bound and no TTL: entries live until they are explicitly evicted.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::application::pagination::Page;
use crate::domain::entities::{CommentRecord, PostRecord, PostSummary, UserRecord};

use super::config::CacheConfig;
use super::keys::{CacheKey, Region};

const METRIC_CACHE_HIT: &str = "newsroom_cache_hit_total";
const METRIC_CACHE_MISS: &str = "newsroom_cache_miss_total";
const METRIC_CACHE_EVICTED: &str = "newsroom_cache_evicted_total";

/// Values held by cache regions.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Post(PostRecord),
    User(UserRecord),
    PostPage(Page<PostSummary>),
    CommentPage(Page<CommentRecord>),
    Image(Bytes),
}

/// Conversion between a typed read result and its cached representation.
pub trait Cacheable: Clone {
    fn into_cached(self) -> CachedValue;

    fn from_cached(value: CachedValue) -> Option<Self>;
}

macro_rules! impl_cacheable {
    ($ty:ty, $variant:ident) => {
        impl Cacheable for $ty {
            fn into_cached(self) -> CachedValue {
                CachedValue::$variant(self)
            }

            fn from_cached(value: CachedValue) -> Option<Self> {
                match value {
                    CachedValue::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_cacheable!(PostRecord, Post);
impl_cacheable!(UserRecord, User);
impl_cacheable!(Page<PostSummary>, PostPage);
impl_cacheable!(Page<CommentRecord>, CommentPage);
impl_cacheable!(Bytes, Image);

/// Reason a cache operation degraded to a no-op. Never surfaced to callers.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheUnavailable {
    #[error("caching is disabled")]
    Disabled,
    #[error("cache region `{0}` is not configured")]
    MissingRegion(Region),
}

/// One named key/value store.
pub struct CacheRegion {
    region: Region,
    entries: DashMap<CacheKey, CachedValue>,
    // Bumped before every eviction; read-through populates compare against it.
    generation: AtomicU64,
}

impl CacheRegion {
    fn new(region: Region) -> Self {
        Self {
            region,
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn advance(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn insert(&self, key: CacheKey, value: CachedValue) {
        self.entries.insert(key, value);
    }

    fn remove(&self, key: &CacheKey) -> bool {
        self.advance();
        self.entries.remove(key).is_some()
    }

    fn remove_matching<P>(&self, predicate: P) -> usize
    where
        P: Fn(&CacheKey) -> bool,
    {
        self.advance();
        let mut evicted = 0;
        self.entries.retain(|key, _| {
            if predicate(key) {
                debug!(region = %self.region, key = %key, "Cache entry evicted");
                evicted += 1;
                false
            } else {
                true
            }
        });
        evicted
    }

    fn clear(&self) -> usize {
        self.remove_matching(|_| true)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Façade over every configured region.
///
/// All operations are infallible: when caching is disabled or the region is
/// not configured, reads miss and writes do nothing.
pub struct CacheStore {
    config: CacheConfig,
    regions: HashMap<Region, CacheRegion>,
}

impl CacheStore {
    /// Create a store materialising the regions named by the configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let regions = if config.enabled {
            config
                .regions
                .iter()
                .map(|region| (*region, CacheRegion::new(*region)))
                .collect()
        } else {
            HashMap::new()
        };

        Self {
            config: config.clone(),
            regions,
        }
    }

    pub fn disabled() -> Self {
        Self::new(&CacheConfig::disabled())
    }

    pub fn is_enabled(&self) -> bool {
        !self.regions.is_empty()
    }

    fn region(&self, region: Region) -> Result<&CacheRegion, CacheUnavailable> {
        if !self.config.enabled {
            return Err(CacheUnavailable::Disabled);
        }
        self.regions
            .get(&region)
            .ok_or(CacheUnavailable::MissingRegion(region))
    }

    fn available(&self, region: Region, op: &'static str) -> Option<&CacheRegion> {
        match self.region(region) {
            Ok(cache) => Some(cache),
            Err(reason) => {
                trace!(op, region = %region, reason = %reason, "Cache operation skipped");
                None
            }
        }
    }

    /// Look up an entry. A disabled or unknown region behaves as a permanent miss.
    pub fn get(&self, region: Region, key: &CacheKey) -> Option<CachedValue> {
        let cache = self.available(region, "get")?;
        let value = cache.get(key);
        if value.is_some() {
            counter!(METRIC_CACHE_HIT, "region" => region.name()).increment(1);
        } else {
            counter!(METRIC_CACHE_MISS, "region" => region.name()).increment(1);
        }
        value
    }

    /// Insert or overwrite an entry.
    pub fn put(&self, region: Region, key: CacheKey, value: CachedValue) {
        if let Some(cache) = self.available(region, "put") {
            trace!(region = %region, key = %key, "Cache entry stored");
            cache.insert(key, value);
        }
    }

    /// Remove one entry if present. Returns whether an entry was removed.
    pub fn evict_exact(&self, region: Region, key: &CacheKey) -> bool {
        let Some(cache) = self.available(region, "evict_exact") else {
            return false;
        };
        let removed = cache.remove(key);
        if removed {
            debug!(region = %region, key = %key, "Cache entry evicted");
            counter!(METRIC_CACHE_EVICTED, "region" => region.name()).increment(1);
        }
        removed
    }

    /// Scan every entry of the region and remove those whose key matches.
    ///
    /// Cost is proportional to the number of live entries in the region.
    pub fn evict_where<P>(&self, region: Region, predicate: P) -> usize
    where
        P: Fn(&CacheKey) -> bool,
    {
        let Some(cache) = self.available(region, "evict_where") else {
            return 0;
        };
        let evicted = cache.remove_matching(predicate);
        counter!(METRIC_CACHE_EVICTED, "region" => region.name()).increment(evicted as u64);
        evicted
    }

    /// Remove every entry of the region.
    pub fn evict_all(&self, region: Region) -> usize {
        let Some(cache) = self.available(region, "evict_all") else {
            return 0;
        };
        let evicted = cache.clear();
        counter!(METRIC_CACHE_EVICTED, "region" => region.name()).increment(evicted as u64);
        evicted
    }

    /// Number of live entries in the region; zero when unavailable.
    pub fn len(&self, region: Region) -> usize {
        self.region(region).map(CacheRegion::len).unwrap_or(0)
    }

    pub fn is_empty(&self, region: Region) -> bool {
        self.len(region) == 0
    }

    pub fn contains(&self, region: Region, key: &CacheKey) -> bool {
        self.region(region)
            .map(|cache| cache.entries.contains_key(key))
            .unwrap_or(false)
    }

    /// Eviction generation of the region, used to stamp read-through populates.
    pub fn generation(&self, region: Region) -> Option<u64> {
        self.region(region).ok().map(CacheRegion::generation)
    }

    /// Insert an entry only if no eviction ran in the region since `seen`.
    ///
    /// The generation is checked again after the insert so that an eviction
    /// racing with the insert cannot leave the entry behind.
    pub fn put_if_fresh(&self, region: Region, key: CacheKey, value: CachedValue, seen: u64) -> bool {
        let Some(cache) = self.available(region, "put_if_fresh") else {
            return false;
        };
        if cache.generation() != seen {
            debug!(region = %region, key = %key, "Discarding stale cache populate");
            return false;
        }

        cache.insert(key.clone(), value);
        if cache.generation() != seen {
            cache.entries.remove(&key);
            debug!(region = %region, key = %key, "Discarding stale cache populate");
            return false;
        }
        true
    }

    /// Read-through lookup: return the cached value, or load it and populate.
    ///
    /// The populate is skipped when an eviction ran in the region while the
    /// loader was in flight, so a load that observed pre-write data cannot
    /// outlive the invalidation that followed the write.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        region: Region,
        key: CacheKey,
        load: F,
    ) -> Result<T, E>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(region, &key) {
            match T::from_cached(cached) {
                Some(value) => return Ok(value),
                None => {
                    warn!(region = %region, key = %key, "Cached value has unexpected shape");
                    self.evict_exact(region, &key);
                }
            }
        }

        let Some(seen) = self.generation(region) else {
            return load().await;
        };

        let value = load().await?;
        self.put_if_fresh(region, key, value.clone().into_cached(), seen);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use time::OffsetDateTime;

    use super::*;
    use crate::application::pagination::PageSpec;

    fn page(n: u32) -> PageSpec {
        PageSpec::new(n, 10).expect("valid page spec")
    }

    fn comment_page(spec: &PageSpec) -> CachedValue {
        CachedValue::CommentPage(Page::empty(spec))
    }

    fn sample_user(id: i64) -> UserRecord {
        UserRecord {
            id,
            name: "Ada".to_string(),
            surname: "Lovelace".to_string(),
            username: format!("ada{id}"),
            picture_url: None,
        }
    }

    fn sample_post(id: i64) -> PostRecord {
        PostRecord {
            id,
            title: format!("Post {id}"),
            description: String::new(),
            tags: Default::default(),
            content: "body".to_string(),
            author_id: 1,
            image_url: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn put_get_roundtrip_and_overwrite() {
        let store = CacheStore::new(&CacheConfig::default());
        let key = CacheKey::User(1);

        assert!(store.get(Region::UserItem, &key).is_none());

        store.put(Region::UserItem, key.clone(), CachedValue::User(sample_user(1)));
        let mut renamed = sample_user(1);
        renamed.name = "Grace".to_string();
        store.put(Region::UserItem, key.clone(), CachedValue::User(renamed));

        match store.get(Region::UserItem, &key) {
            Some(CachedValue::User(user)) => assert_eq!(user.name, "Grace"),
            other => panic!("unexpected cache content: {other:?}"),
        }
        assert_eq!(store.len(Region::UserItem), 1);
    }

    #[test]
    fn regions_do_not_share_entries() {
        let store = CacheStore::new(&CacheConfig::default());
        store.put(Region::PostItem, CacheKey::Post(1), CachedValue::Post(sample_post(1)));

        assert!(store.get(Region::UserItem, &CacheKey::Post(1)).is_none());
        assert_eq!(store.evict_all(Region::UserItem), 0);
        assert!(store.contains(Region::PostItem, &CacheKey::Post(1)));
    }

    #[test]
    fn evict_exact_removes_single_entry() {
        let store = CacheStore::new(&CacheConfig::default());
        store.put(Region::PostItem, CacheKey::Post(1), CachedValue::Post(sample_post(1)));
        store.put(Region::PostItem, CacheKey::Post(2), CachedValue::Post(sample_post(2)));

        assert!(store.evict_exact(Region::PostItem, &CacheKey::Post(1)));
        assert!(!store.evict_exact(Region::PostItem, &CacheKey::Post(1)));
        assert!(store.get(Region::PostItem, &CacheKey::Post(1)).is_none());
        assert!(store.get(Region::PostItem, &CacheKey::Post(2)).is_some());
    }

    #[test]
    fn evict_where_only_touches_matching_keys() {
        let store = CacheStore::new(&CacheConfig::default());
        for post_id in [1, 2] {
            for n in 0..3 {
                let spec = page(n);
                store.put(
                    Region::RootComments,
                    CacheKey::root_comments(post_id, spec.clone()),
                    comment_page(&spec),
                );
            }
        }

        let evicted = store.evict_where(Region::RootComments, |key| key.post_id() == Some(1));

        assert_eq!(evicted, 3);
        assert_eq!(store.len(Region::RootComments), 3);
        for n in 0..3 {
            assert!(store.contains(Region::RootComments, &CacheKey::root_comments(2, page(n))));
        }
    }

    #[test]
    fn evict_all_clears_region() {
        let store = CacheStore::new(&CacheConfig::default());
        for n in 0..4 {
            let spec = page(n);
            store.put(
                Region::PostList,
                CacheKey::PostPage(spec.clone()),
                CachedValue::PostPage(Page::empty(&spec)),
            );
        }

        assert_eq!(store.evict_all(Region::PostList), 4);
        assert!(store.is_empty(Region::PostList));
    }

    #[test]
    fn disabled_store_is_a_permanent_miss() {
        let store = CacheStore::disabled();
        let key = CacheKey::Post(1);

        store.put(Region::PostItem, key.clone(), CachedValue::Post(sample_post(1)));

        assert!(!store.is_enabled());
        assert!(store.get(Region::PostItem, &key).is_none());
        assert!(!store.evict_exact(Region::PostItem, &key));
        assert_eq!(store.evict_where(Region::PostItem, |_| true), 0);
        assert_eq!(store.evict_all(Region::PostItem), 0);
        assert_eq!(store.len(Region::PostItem), 0);
        assert_eq!(store.generation(Region::PostItem), None);
        assert!(!store.put_if_fresh(
            Region::PostItem,
            key,
            CachedValue::Post(sample_post(1)),
            0
        ));
    }

    #[test]
    fn unconfigured_region_is_a_no_op() {
        let store = CacheStore::new(&CacheConfig::with_regions([Region::PostItem]));
        let key = CacheKey::User(1);

        store.put(Region::UserItem, key.clone(), CachedValue::User(sample_user(1)));

        assert!(store.is_enabled());
        assert!(store.get(Region::UserItem, &key).is_none());
        assert_eq!(store.evict_all(Region::UserItem), 0);
    }

    #[test]
    fn put_if_fresh_rejects_after_eviction() {
        let store = CacheStore::new(&CacheConfig::default());
        let seen = store.generation(Region::PostItem).expect("region exists");

        store.evict_exact(Region::PostItem, &CacheKey::Post(9));

        let stored = store.put_if_fresh(
            Region::PostItem,
            CacheKey::Post(1),
            CachedValue::Post(sample_post(1)),
            seen,
        );
        assert!(!stored);
        assert!(store.is_empty(Region::PostItem));

        let seen = store.generation(Region::PostItem).expect("region exists");
        assert!(store.put_if_fresh(
            Region::PostItem,
            CacheKey::Post(1),
            CachedValue::Post(sample_post(1)),
            seen,
        ));
    }

    #[tokio::test]
    async fn get_or_load_populates_then_hits() {
        let store = CacheStore::new(&CacheConfig::default());
        let mut loads = 0;

        for _ in 0..3 {
            let user: Result<UserRecord, std::convert::Infallible> = store
                .get_or_load(Region::UserItem, CacheKey::User(4), || {
                    loads += 1;
                    async { Ok(sample_user(4)) }
                })
                .await;
            assert_eq!(user.expect("loaded").id, 4);
        }

        assert_eq!(loads, 1);
    }

    #[tokio::test]
    async fn get_or_load_propagates_loader_errors_without_populating() {
        let store = CacheStore::new(&CacheConfig::default());

        let result: Result<UserRecord, &str> = store
            .get_or_load(Region::UserItem, CacheKey::User(4), || async { Err("boom") })
            .await;

        assert_eq!(result, Err("boom"));
        assert!(store.is_empty(Region::UserItem));
    }

    #[tokio::test]
    async fn get_or_load_discards_populate_raced_by_eviction() {
        let store = CacheStore::new(&CacheConfig::default());

        let result: Result<UserRecord, std::convert::Infallible> = store
            .get_or_load(Region::UserItem, CacheKey::User(4), || {
                // A writer invalidates while the read is in flight.
                store.evict_exact(Region::UserItem, &CacheKey::User(4));
                async { Ok(sample_user(4)) }
            })
            .await;

        assert!(result.is_ok());
        assert!(store.get(Region::UserItem, &CacheKey::User(4)).is_none());
    }

    #[test]
    fn concurrent_writers_and_evictors_leave_consistent_state() {
        let store = Arc::new(CacheStore::new(&CacheConfig::default()));

        thread::scope(|scope| {
            for worker in 0..4_i64 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for n in 0..200_u32 {
                        let spec = PageSpec::new(n % 10, 10).expect("valid page spec");
                        store.put(
                            Region::RootComments,
                            CacheKey::root_comments(worker, spec.clone()),
                            comment_page(&spec),
                        );
                        if n % 7 == 0 {
                            store.evict_where(Region::RootComments, |key| {
                                key.post_id() == Some(worker)
                            });
                        }
                    }
                });
            }
        });

        store.evict_where(Region::RootComments, |key| key.post_id() == Some(0));
        assert!(store.len(Region::RootComments) <= 30);
        assert_eq!(
            store.evict_where(Region::RootComments, |key| key.post_id() == Some(0)),
            0
        );
    }
}
