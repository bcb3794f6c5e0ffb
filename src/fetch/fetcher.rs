//! HTTP fetcher for binary assets
//!
//! This module handles the requests made after the reveal phase:
//! - Building the HTTP client with the configured user agent and timeout
//! - GET requests returning raw bytes and the status code
//! - Error classification (timeout, connection, other)

use crate::config::FetchConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on connection setup, whatever the overall timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A fetched response body
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub status: u16,
    pub bytes: Vec<u8>,
}

impl FetchedAsset {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Per-asset fetch failures; counted, never fatal
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{0} timed out")]
    Timeout(String),

    #[error("{url}: {message}")]
    Network { url: String, message: String },

    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },
}

/// Source of asset bytes
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a URL, returning the body for any HTTP status
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, FetchError>;
}

/// Builds the HTTP client used for asset downloads
///
/// The connect timeout never exceeds the overall request timeout.
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout())
        .connect_timeout(CONNECT_TIMEOUT.min(config.timeout()))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Fetcher`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

fn classify(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else if e.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| classify(url, e))?;

        Ok(FetchedAsset {
            status,
            bytes: bytes.to_vec(),
        })
    }
}
