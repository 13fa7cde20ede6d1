//! Download, verification, and retrieval of the agent image

use crate::cache::digest::DigestWriter;
use crate::cache::locator::resolve_desired_image_path;
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::fetch::{FetchError, HttpFetcher, RemoteFetch};
use crate::metadata::{ImdsRegionProvider, RegionProvider};
use std::cell::OnceCell;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Prefix of in-flight download files inside the cache directory
const TEMP_FILE_PREFIX: &str = "agent.tar.";

/// Content of the cache state marker
const STATE_MARKER: &[u8] = b"1";

/// Manages the on-disk cache of the agent image.
///
/// Composes an injected remote-fetch capability and an optional
/// region-resolution capability over a fixed filesystem layout. All
/// operations are blocking; the caller serializes downloads.
pub struct Downloader<F = HttpFetcher, M = ImdsRegionProvider> {
    config: Config,
    fetcher: F,
    metadata: Option<M>,
    region: OnceCell<String>,
}

impl Downloader {
    /// Downloader with the default capabilities: blocking HTTP and EC2
    /// instance metadata
    pub fn new(config: Config) -> Self {
        Self::with_capabilities(config, HttpFetcher::new(), Some(ImdsRegionProvider::new()))
    }
}

impl<F: RemoteFetch, M: RegionProvider> Downloader<F, M> {
    /// Downloader with injected capabilities. Passing `None` for metadata
    /// pins the region to the configured default.
    pub fn with_capabilities(config: Config, fetcher: F, metadata: Option<M>) -> Self {
        let region = OnceCell::new();
        if metadata.is_none() {
            let _ = region.set(config.remote.default_region.clone());
        }
        Self {
            config,
            fetcher,
            metadata,
            region,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Region for remote URL construction, resolved at most once.
    ///
    /// A metadata failure logs a warning and pins the configured default, so
    /// a slow or absent metadata service is queried only once per instance.
    pub fn region(&self) -> &str {
        self.region.get_or_init(|| match &self.metadata {
            Some(provider) => match provider.region() {
                Ok(region) => region,
                Err(e) => {
                    warn!("Could not retrieve region from instance metadata: {}", e);
                    self.config.remote.default_region.clone()
                }
            },
            None => self.config.remote.default_region.clone(),
        })
    }

    /// True if a cached copy of the agent is present and the cache state
    /// marker is non-empty. No validation of either file's contents.
    pub fn is_agent_cached(&self) -> bool {
        file_not_empty(&self.config.cache_state()) && file_not_empty(&self.config.agent_tarball())
    }

    /// Download a fresh copy of the agent and verify its integrity.
    ///
    /// The tarball streams into a temp file inside the cache directory while
    /// a SHA-256 digest runs over the written bytes. Only when the digest
    /// matches the published checksum is the temp file renamed onto the
    /// canonical path. On any failure the canonical artifact is untouched
    /// and the temp file is removed.
    pub fn download_agent(&self) -> CacheResult<()> {
        self.ensure_cache_dir()?;

        let region = self.region().to_string();
        let expected = self.fetch_published_checksum(&region)?;

        let tarball_url = self.config.remote_tarball_url(&region);
        let mut body = self.fetch_tarball_stream(&tarball_url)?;

        let dir = &self.config.cache.directory;
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .tempfile_in(dir)
            .map_err(|e| CacheError::io(format!("creating temp file in {}", dir.display()), e))?;
        debug!("Temp file {}", temp.path().display());

        let mut writer = DigestWriter::new(temp.as_file_mut());
        let copied = io::copy(&mut body, &mut writer);
        let calculated = writer.finalize_hex();
        if let Err(e) = copied {
            remove_temp(temp);
            return Err(CacheError::io(
                format!("streaming {} to temp file", tarball_url),
                e,
            ));
        }

        debug!("Expected {}", expected);
        debug!("Calculated {}", calculated);
        if expected != calculated {
            remove_temp(temp);
            return Err(CacheError::ChecksumMismatch {
                url: tarball_url,
                expected,
                calculated,
            });
        }

        let tarball = self.config.agent_tarball();
        debug!(
            "Attempting to rename {} to {}",
            temp.path().display(),
            tarball.display()
        );
        match temp.persist(&tarball) {
            Ok(_) => Ok(()),
            Err(e) => {
                // Leave the temp file behind; the canonical artifact is unchanged
                let _ = e.file.keep();
                Err(CacheError::io(
                    format!("renaming temp file to {}", tarball.display()),
                    e.error,
                ))
            }
        }
    }

    /// Record that a usable agent is cached by writing the state marker.
    ///
    /// Deliberately not invoked by `download_agent`; the caller marks the
    /// cache only after its own validation of the downloaded artifact.
    pub fn record_cached_agent(&self) -> CacheResult<()> {
        let path = self.config.cache_state();
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o700);
        }
        let mut file = options
            .open(&path)
            .map_err(|e| CacheError::io(format!("opening cache state {}", path.display()), e))?;
        file.write_all(STATE_MARKER)
            .map_err(|e| CacheError::io(format!("writing cache state {}", path.display()), e))
    }

    /// Open the cached agent tarball for reading
    pub fn load_cached_agent(&self) -> CacheResult<File> {
        let path = self.config.agent_tarball();
        File::open(&path)
            .map_err(|e| CacheError::io(format!("opening cached agent {}", path.display()), e))
    }

    /// Open the agent image named by the desired-image locator for reading
    pub fn load_desired_agent(&self) -> CacheResult<File> {
        let path = resolve_desired_image_path(&self.config)?;
        File::open(&path)
            .map_err(|e| CacheError::io(format!("opening desired agent {}", path.display()), e))
    }

    fn ensure_cache_dir(&self) -> CacheResult<()> {
        let dir = &self.config.cache.directory;
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(dir).map_err(|e| CacheError::CacheDirCreate {
            path: dir.clone(),
            source: e,
        })
    }

    /// Fetch the checksum manifest and trim its body to the expected
    /// lowercase hex digest
    fn fetch_published_checksum(&self, region: &str) -> CacheResult<String> {
        let url = self.config.remote_checksum_url(region);
        debug!("Downloading published checksum from {}", url);
        let mut response = self.fetcher.get(&url).map_err(CacheError::ChecksumFetch)?;
        if !response.is_success() {
            return Err(CacheError::ChecksumFetch(FetchError::new(
                &url,
                format!("unexpected response code {}", response.status),
            )));
        }
        let mut body = String::new();
        response
            .body
            .read_to_string(&mut body)
            .map_err(|e| CacheError::ChecksumFetch(FetchError::new(&url, e.to_string())))?;
        Ok(body.trim().to_string())
    }

    /// Fetch the tarball body as a live stream, rejecting non-success status
    fn fetch_tarball_stream(&self, url: &str) -> CacheResult<Box<dyn Read>> {
        debug!("Downloading agent tarball from {}", url);
        let response = self.fetcher.get(url).map_err(CacheError::ArtifactFetch)?;
        if !response.is_success() {
            return Err(CacheError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }
}

fn file_not_empty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Best-effort temp file removal; a failure here must not mask the error
/// that got us here
fn remove_temp(temp: NamedTempFile) {
    debug!("Removing temp file {}", temp.path().display());
    if let Err(e) = temp.close() {
        warn!("Failed to remove temp file: {}", e);
    }
}
