//! On-disk cache of the agent image tarball
//!
//! The cache directory holds the canonical verified tarball, a state marker
//! recording that a write-through completed, and an optional desired-image
//! locator redirecting loads to a differently named artifact.
//!
//! # Integrity Model
//!
//! - Downloads stream into a temp file while a SHA-256 digest runs over the
//!   same bytes
//! - The temp file is promoted to the canonical path by atomic rename, and
//!   only after the digest matches the published checksum
//! - Readers of the canonical path therefore see either the previous
//!   verified artifact or the new one, never a partial write
//! - Cached artifacts are not re-verified at load time; presence plus a
//!   non-empty state marker is the signal
//!
//! Single-writer discipline is the caller's responsibility; no file locking
//! is performed.

pub mod digest;
pub mod locator;
pub mod manager;

pub use digest::DigestWriter;
pub use locator::resolve_desired_image_path;
pub use manager::Downloader;
