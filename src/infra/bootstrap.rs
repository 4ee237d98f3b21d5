use std::sync::Arc;

use tracing::info;

use crate::application::context::{AppContext, Repositories};
use crate::cache::CacheConfig;
use crate::config::Settings;

use super::error::InfraError;
use super::images::FsImageStore;
use super::memory::InMemoryStore;

/// Wire services over the in-memory store and the configured image directory.
pub fn in_memory(settings: &Settings) -> Result<(AppContext, Arc<InMemoryStore>), InfraError> {
    let store = Arc::new(InMemoryStore::new());
    let images = Arc::new(FsImageStore::new(settings.storage.image_directory.clone())?);
    let pictures = Arc::new(FsImageStore::new(settings.storage.picture_directory.clone())?);
    let cache = CacheConfig::from(&settings.cache);

    info!(
        cache_enabled = cache.is_enabled(),
        regions = cache.regions.len(),
        image_directory = %settings.storage.image_directory.display(),
        picture_directory = %settings.storage.picture_directory.display(),
        "Application context initialised"
    );

    let context = AppContext::new(
        Repositories::from_shared(store.clone()),
        images,
        pictures,
        &cache,
    );
    Ok((context, store))
}
