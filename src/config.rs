// Cache configuration.
// Resolves the cache root and default freshness thresholds, with env overrides.

use std::env::VarError;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwrError};
use crate::freshness::Thresholds;

/// Environment variable overriding the cache directory.
pub const ENV_CACHE_DIR: &str = "SWR_CACHE_DIR";
/// Environment variable overriding the refetch threshold, in seconds.
pub const ENV_REFETCH_SECS: &str = "SWR_REFETCH_SECS";
/// Environment variable overriding the invalid threshold, in seconds.
pub const ENV_INVALID_SECS: &str = "SWR_INVALID_SECS";

/// Get the default cache directory (`<data dir>/swr-cache/cache`).
pub fn default_cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "swr-cache").map(|dirs| dirs.data_dir().join("cache"))
}

/// Configuration for a cache store and the subscriptions built on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory holding one JSON file per key.
    pub dir: PathBuf,
    /// Default thresholds for new subscriptions.
    #[serde(default)]
    pub thresholds: Thresholds,
}

impl CacheConfig {
    /// Configuration rooted at an explicit directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            thresholds: Thresholds::default(),
        }
    }

    /// Configuration rooted at the platform data directory.
    pub fn platform_default() -> Result<Self> {
        default_cache_dir()
            .map(Self::with_dir)
            .ok_or_else(|| SwrError::Config("no home directory to place the cache in".into()))
    }

    /// Platform defaults with `SWR_CACHE_DIR`, `SWR_REFETCH_SECS` and
    /// `SWR_INVALID_SECS` applied on top.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Like [`Self::from_env`], but an explicit `dir` wins over the
    /// environment.
    pub fn load(dir: Option<PathBuf>) -> Result<Self> {
        let dir = dir.or_else(|| {
            std::env::var_os(ENV_CACHE_DIR)
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
        });
        let mut config = match dir {
            Some(dir) => Self::with_dir(dir),
            None => Self::platform_default()?,
        };

        if let Some(secs) = env_secs(ENV_REFETCH_SECS)? {
            config.thresholds.refetch_after = Duration::from_secs(secs);
        }
        if let Some(secs) = env_secs(ENV_INVALID_SECS)? {
            config.thresholds.invalid_after = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn env_secs(name: &str) -> Result<Option<u64>> {
    parse_secs(name, std::env::var(name))
}

fn parse_secs(name: &str, var: std::result::Result<String, VarError>) -> Result<Option<u64>> {
    match var {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| {
                SwrError::Config(format!("{name} must be a number of seconds, got {value:?}"))
            }),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(value)) => Err(SwrError::Config(format!(
            "{name} must be valid UTF-8, got {value:?}"
        ))),
    }
}
