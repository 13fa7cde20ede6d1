//! Error types for agentcache
//!
//! All modules use `CacheResult<T>` as their return type.

use crate::fetch::FetchError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur while managing the agent image cache
#[derive(Error, Debug)]
pub enum CacheError {
    // Cache directory errors
    #[error("Failed to create cache directory {path}: {source}")]
    CacheDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Remote fetch errors
    #[error("Failed to fetch published checksum: {0}")]
    ChecksumFetch(#[source] FetchError),

    #[error("Failed to fetch agent tarball: {0}")]
    ArtifactFetch(#[source] FetchError),

    #[error("Unexpected response code {status} while downloading {url}")]
    UnexpectedStatus { url: String, status: u16 },

    // Integrity errors
    #[error("Mismatched checksum while downloading {url}: expected {expected}, calculated {calculated}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        calculated: String,
    },

    // Desired-image locator errors
    #[error("Desired image locator {path} does not end its first line with a newline")]
    LocatorMissingNewline { path: PathBuf },

    #[error("Desired image locator {path} names no usable file: {line:?}")]
    LocatorInvalid { path: PathBuf, line: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True when a download failed integrity verification rather than
    /// transport. Callers may want to alert instead of retry.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }
}
