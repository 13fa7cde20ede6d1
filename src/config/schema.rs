//! Configuration schema for agentcache
//!
//! Configuration is stored at `~/.config/agentcache/config.toml`. Every
//! section has defaults, so a missing or partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// On-disk cache layout
    pub cache: CacheConfig,

    /// Remote object-store naming
    pub remote: RemoteConfig,
}

/// On-disk cache layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the tarball, state marker, and locator files
    pub directory: PathBuf,

    /// File name of the canonical verified tarball
    pub tarball_name: String,

    /// File name of the cache state marker
    pub state_name: String,

    /// File name of the desired-image locator
    pub desired_image_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/cache/agent"),
            tarball_name: "agent.tar".to_string(),
            state_name: "state".to_string(),
            desired_image_name: "desired-image".to_string(),
        }
    }
}

/// Remote object-store naming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Region used when instance metadata is unavailable
    pub default_region: String,

    /// Tarball URL template; `{region}` is replaced with the resolved region
    pub tarball_url_template: String,

    /// Suffix appended to the tarball URL to form the checksum-manifest URL
    pub checksum_suffix: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            default_region: "us-east-1".to_string(),
            tarball_url_template:
                "https://agent-releases-{region}.s3.amazonaws.com/agent-latest.tar".to_string(),
            checksum_suffix: ".sha256".to_string(),
        }
    }
}

impl Config {
    /// Path of the canonical verified tarball
    pub fn agent_tarball(&self) -> PathBuf {
        self.cache.directory.join(&self.cache.tarball_name)
    }

    /// Path of the cache state marker file
    pub fn cache_state(&self) -> PathBuf {
        self.cache.directory.join(&self.cache.state_name)
    }

    /// Path of the desired-image locator file
    pub fn desired_image_locator(&self) -> PathBuf {
        self.cache.directory.join(&self.cache.desired_image_name)
    }

    /// Remote tarball URL for a region
    pub fn remote_tarball_url(&self, region: &str) -> String {
        self.remote.tarball_url_template.replace("{region}", region)
    }

    /// Remote checksum-manifest URL for a region
    pub fn remote_checksum_url(&self, region: &str) -> String {
        format!(
            "{}{}",
            self.remote_tarball_url(region),
            self.remote.checksum_suffix
        )
    }
}
