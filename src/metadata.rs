//! Region resolution via instance metadata
//!
//! The downloader needs a region only to build remote URLs. Resolution is
//! best-effort: any failure here is logged by the caller and replaced with
//! the configured default region.

use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure to resolve the deployment region from instance metadata
#[derive(Error, Debug)]
#[error("instance metadata lookup failed: {0}")]
pub struct MetadataError(pub String);

/// Metadata lookup with a caller-side fallback default
pub trait RegionProvider {
    fn region(&self) -> Result<String, MetadataError>;
}

/// EC2 instance metadata service (IMDSv2) region provider
pub struct ImdsRegionProvider {
    agent: ureq::Agent,
    endpoint: String,
}

const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254";
const TOKEN_TTL_SECONDS: &str = "21600";

impl ImdsRegionProvider {
    /// Whole-lookup deadline; off-EC2 hosts must fall back quickly
    const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_IMDS_ENDPOINT)
    }

    /// Point the provider at a custom metadata endpoint (used in tests)
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Self::LOOKUP_TIMEOUT))
            .build();
        Self {
            agent: config.new_agent(),
            endpoint: endpoint.into(),
        }
    }

    fn fetch_token(&self) -> Result<String, MetadataError> {
        let url = format!("{}/latest/api/token", self.endpoint);
        let token = self
            .agent
            .put(&url)
            .header("x-aws-ec2-metadata-token-ttl-seconds", TOKEN_TTL_SECONDS)
            .send_empty()
            .map_err(|e| MetadataError(format!("requesting session token: {}", e)))?
            .into_body()
            .read_to_string()
            .map_err(|e| MetadataError(format!("reading session token: {}", e)))?;
        Ok(token.trim().to_string())
    }
}

impl Default for ImdsRegionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionProvider for ImdsRegionProvider {
    fn region(&self) -> Result<String, MetadataError> {
        let token = self.fetch_token()?;
        let url = format!("{}/latest/meta-data/placement/region", self.endpoint);
        debug!("Querying instance metadata for region");
        let region = self
            .agent
            .get(&url)
            .header("x-aws-ec2-metadata-token", &token)
            .call()
            .map_err(|e| MetadataError(format!("requesting region: {}", e)))?
            .into_body()
            .read_to_string()
            .map_err(|e| MetadataError(format!("reading region: {}", e)))?;

        let region = region.trim().to_string();
        if region.is_empty() {
            return Err(MetadataError("metadata returned an empty region".to_string()));
        }
        Ok(region)
    }
}
