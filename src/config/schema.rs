//! Configuration schema for buildcache
//!
//! Configuration is stored at `~/.config/buildcache/config.toml`

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache resolution settings
    pub cache: CacheSettings,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache resolution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// References seeding the history-based cache when none are given
    pub cache_from: Vec<String>,

    /// Version string recorded on restored images
    pub builder_version: String,

    /// Per-reference lookup timeout while seeding (0 = unbounded)
    pub seed_timeout_secs: u64,

    /// Treat cyclic parent links as store corruption instead of "not an ancestor"
    pub reject_parent_cycles: bool,

    /// Let images without OS/architecture match a build for the host platform
    pub legacy_platform_wildcard: bool,
}

impl CacheSettings {
    /// Seed lookup timeout, if bounded
    pub fn seed_timeout(&self) -> Option<Duration> {
        (self.seed_timeout_secs > 0).then(|| Duration::from_secs(self.seed_timeout_secs))
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_from: Vec::new(),
            builder_version: env!("CARGO_PKG_VERSION").to_string(),
            seed_timeout_secs: 0,
            reject_parent_cycles: true,
            legacy_platform_wildcard: true,
        }
    }
}
