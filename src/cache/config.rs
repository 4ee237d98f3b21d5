//! Cache configuration.
//!
//! Controls whether caching is active and which regions exist, via the
//! `[cache]` table of `newsroom.toml`.

use std::collections::BTreeSet;

use super::keys::Region;

/// Cache configuration resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Master switch. When off, every store operation is a miss or a no-op.
    pub enabled: bool,
    /// Regions that are materialised. Operations on any other region are no-ops.
    pub regions: BTreeSet<Region>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            regions: Region::ALL.into_iter().collect(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            regions: settings.regions.clone(),
        }
    }
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Configuration with only the listed regions materialised.
    pub fn with_regions(regions: impl IntoIterator<Item = Region>) -> Self {
        Self {
            enabled: true,
            regions: regions.into_iter().collect(),
        }
    }

    /// Returns true if caching is on and at least one region exists.
    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.regions.is_empty()
    }
}
