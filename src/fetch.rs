//! Remote fetch capability
//!
//! A narrow HTTP GET abstraction so the downloader can be exercised with
//! deterministic test doubles. The production implementation is a blocking
//! ureq agent.

use std::io::Read;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failure for a single GET request
#[derive(Error, Debug)]
#[error("GET {url} failed: {reason}")]
pub struct FetchError {
    pub url: String,
    pub reason: String,
}

impl FetchError {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Response to a GET request: the status code and a live body stream.
///
/// The body is not buffered; the caller drains or drops it.
pub struct FetchResponse {
    pub status: u16,
    pub body: Box<dyn Read>,
}

impl FetchResponse {
    /// True for any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP-like GET returning a status code and a body stream.
///
/// Implementations report only transport failures as `Err`; a non-success
/// status code is a valid response and is the caller's policy to judge.
pub trait RemoteFetch {
    fn get(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// Blocking HTTP fetcher backed by ureq
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Connect timeout for remote object-store requests
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        // Status codes are data here, not errors
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(Self::CONNECT_TIMEOUT))
            .build();
        Self {
            agent: config.new_agent(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteFetch for HttpFetcher {
    fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| FetchError::new(url, e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.into_body().into_reader();
        Ok(FetchResponse {
            status,
            body: Box::new(body),
        })
    }
}
