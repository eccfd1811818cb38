//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{CacheOptions, DEFAULT_STORAGE_KEY};
use crate::host::ObserveOptions;
use crate::media::{ControllerOptions, DEFAULT_CRITICAL_COUNT, DEFAULT_METADATA_PREFIX};

mod cli;

pub use cli::{CacheCommand, CliArgs, Command, Overrides};

const LOCAL_CONFIG_BASENAME: &str = "video_media_cache";
const ENV_PREFIX: &str = "VIDEO_MEDIA_CACHE";
const DEFAULT_TTL_SECS: u64 = 5 * 60;
const DEFAULT_STORAGE_DIR: &str = "video_cache";
const DEFAULT_ROOT_MARGIN: &str = "50px 0px";
const DEFAULT_THRESHOLD: f64 = 0.1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub cache: CacheSettings,
    pub lazy: LazySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub storage_key: String,
    pub storage_dir: PathBuf,
}

impl CacheSettings {
    pub fn options(&self) -> CacheOptions {
        CacheOptions {
            ttl: self.ttl,
            storage_key: self.storage_key.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LazySettings {
    pub observe: ObserveOptions,
    pub critical_count: NonZeroUsize,
    pub metadata_prefix: String,
}

impl LazySettings {
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            observe: self.observe.clone(),
            metadata_prefix: self.metadata_prefix.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    cache: RawCacheSettings,
    lazy: RawLazySettings,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    ttl_secs: Option<u64>,
    storage_key: Option<String>,
    storage_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLazySettings {
    root_margin: Option<String>,
    threshold: Option<f64>,
    critical_count: Option<usize>,
    metadata_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(dir) = overrides.storage_dir.as_ref() {
            self.cache.storage_dir = Some(dir.clone());
        }
        if let Some(ttl) = overrides.ttl_secs {
            self.cache.ttl_secs = Some(ttl);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if overrides.log_json {
            self.logging.json = Some(true);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let RawSettings {
            cache,
            lazy,
            logging,
        } = raw;

        let ttl_secs = cache.ttl_secs.unwrap_or(DEFAULT_TTL_SECS);
        if ttl_secs == 0 {
            return Err(ConfigError::invalid("cache.ttl_secs", "must be greater than zero"));
        }
        let storage_key = cache
            .storage_key
            .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string());
        if storage_key.trim().is_empty() {
            return Err(ConfigError::invalid("cache.storage_key", "must not be empty"));
        }

        let threshold = lazy.threshold.unwrap_or(DEFAULT_THRESHOLD);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::invalid(
                "lazy.threshold",
                format!("{threshold} is outside [0, 1]"),
            ));
        }
        let critical_count = NonZeroUsize::new(
            lazy.critical_count.unwrap_or(DEFAULT_CRITICAL_COUNT),
        )
        .ok_or_else(|| ConfigError::invalid("lazy.critical_count", "must be greater than zero"))?;

        let level = match logging.level.as_deref() {
            Some(level) => LevelFilter::from_str(level)
                .map_err(|err| ConfigError::invalid("logging.level", err.to_string()))?,
            None => LevelFilter::INFO,
        };
        let format = if logging.json.unwrap_or(false) {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };

        Ok(Self {
            cache: CacheSettings {
                ttl: Duration::from_secs(ttl_secs),
                storage_key,
                storage_dir: cache
                    .storage_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR)),
            },
            lazy: LazySettings {
                observe: ObserveOptions {
                    root_margin: lazy
                        .root_margin
                        .unwrap_or_else(|| DEFAULT_ROOT_MARGIN.to_string()),
                    threshold,
                },
                critical_count,
                metadata_prefix: lazy
                    .metadata_prefix
                    .unwrap_or_else(|| DEFAULT_METADATA_PREFIX.to_string()),
            },
            logging: LoggingSettings { level, format },
        })
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, ConfigError> {
    let mut builder =
        Config::builder().add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);
    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), ConfigError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
