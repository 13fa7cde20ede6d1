//! agentcache - Checksum-verified on-disk cache for agent image tarballs
//!
//! Downloads a versioned agent image from a region-scoped object store,
//! verifies it against the published checksum while streaming to disk, and
//! only then atomically promotes it to the canonical cache path. A reader
//! never observes a partially written artifact.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod metadata;

pub use cache::Downloader;
pub use config::Config;
pub use error::{CacheError, CacheResult};
