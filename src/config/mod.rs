//! Configuration layer: typed settings with layered precedence (file → env).

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    str::FromStr,
};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::Region;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "newsroom";
const ENV_PREFIX: &str = "NEWSROOM";
const DEFAULT_IMAGE_DIR: &str = "uploads/post-images";
const DEFAULT_PICTURE_DIR: &str = "uploads/user-pictures";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Read once at startup; the cache is never toggled at runtime.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub regions: BTreeSet<Region>,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub image_directory: PathBuf,
    pub picture_directory: PathBuf,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (default file → local file →
/// explicit file → environment).
pub fn load(config_file: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("cache.regions")
            .try_parsing(true),
    );

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    storage: RawStorageSettings,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            storage,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            storage: build_storage_settings(storage)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let regions = match cache.regions {
        Some(names) => names
            .iter()
            .map(|name| {
                name.parse::<Region>()
                    .map_err(|err| LoadError::invalid("cache.regions", err.to_string()))
            })
            .collect::<Result<BTreeSet<_>, _>>()?,
        None => Region::ALL.into_iter().collect(),
    };

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        regions,
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let image_directory = directory_or_default(
        storage.image_directory,
        DEFAULT_IMAGE_DIR,
        "storage.image_directory",
    )?;
    let picture_directory = directory_or_default(
        storage.picture_directory,
        DEFAULT_PICTURE_DIR,
        "storage.picture_directory",
    )?;

    Ok(StorageSettings {
        image_directory,
        picture_directory,
    })
}

fn directory_or_default(
    value: Option<PathBuf>,
    default: &str,
    key: &'static str,
) -> Result<PathBuf, LoadError> {
    let directory = value.unwrap_or_else(|| PathBuf::from(default));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    Ok(directory)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    regions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    image_directory: Option<PathBuf>,
    picture_directory: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = std::env::var(key).ok();
            // SAFETY: every test touching the environment runs under `#[serial]`.
            unsafe { std::env::set_var(key, value) };
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            // SAFETY: see `EnvVarGuard::set`.
            unsafe {
                match self.previous.as_deref() {
                    Some(value) => std::env::set_var(self.key, value),
                    None => std::env::remove_var(self.key),
                }
            }
        }
    }

    #[test]
    fn defaults_enable_every_region() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.regions.len(), Region::ALL.len());
        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert!(matches!(settings.logging.format, LogFormat::Compact));
        assert_eq!(
            settings.storage.image_directory,
            PathBuf::from(DEFAULT_IMAGE_DIR)
        );
        assert_eq!(
            settings.storage.picture_directory,
            PathBuf::from(DEFAULT_PICTURE_DIR)
        );
    }

    #[test]
    fn region_allow_list_is_parsed() {
        let mut raw = RawSettings::default();
        raw.cache.regions = Some(vec!["post_item".to_string(), "Root-Comments".to_string()]);

        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(
            settings.cache.regions,
            BTreeSet::from([Region::PostItem, Region::RootComments])
        );
    }

    #[test]
    fn unknown_region_is_rejected() {
        let mut raw = RawSettings::default();
        raw.cache.regions = Some(vec!["comments".to_string()]);

        let err = Settings::from_raw(raw).expect_err("unknown region");

        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "cache.regions",
                ..
            }
        ));
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut raw = RawSettings::default();
        raw.logging.level = Some("loud".to_string());

        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    #[serial]
    fn explicit_file_is_layered_over_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp config file");
        writeln!(
            file,
            "[cache]\nenabled = false\n\n[logging]\nlevel = \"debug\"\njson = true\n\n[storage]\nimage_directory = \"/var/lib/newsroom/images\""
        )
        .expect("write config");

        let settings = load(Some(file.path())).expect("settings load");

        assert!(!settings.cache.enabled);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert!(matches!(settings.logging.format, LogFormat::Json));
        assert_eq!(
            settings.storage.image_directory,
            PathBuf::from("/var/lib/newsroom/images")
        );
    }

    #[test]
    #[serial]
    fn environment_overrides_region_list_and_flags() {
        let _regions = EnvVarGuard::set("NEWSROOM__CACHE__REGIONS", "post_item,root_comments");
        let _enabled = EnvVarGuard::set("NEWSROOM__CACHE__ENABLED", "false");

        let settings = load(None).expect("settings load");

        assert!(!settings.cache.enabled);
        assert_eq!(
            settings.cache.regions,
            BTreeSet::from([Region::PostItem, Region::RootComments])
        );
    }

    #[test]
    #[serial]
    fn environment_accepts_single_region() {
        let _regions = EnvVarGuard::set("NEWSROOM__CACHE__REGIONS", "post_item");

        let settings = load(None).expect("settings load");

        assert_eq!(settings.cache.regions, BTreeSet::from([Region::PostItem]));
    }
}
