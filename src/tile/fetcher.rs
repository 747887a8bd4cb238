//! Tile fetching.
//!
//! [`TileFetcher`] abstracts how tile bytes are obtained so the stitch worker
//! can be tested without a network. [`HttpTileFetcher`] is the production
//! implementation backed by a shared `reqwest` client.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;

use crate::error::FetchError;

/// Default per-tile fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// User-Agent sent with tile requests. Several public tile servers reject
/// requests without one.
const USER_AGENT: &str = concat!("bigmap/", env!("CARGO_PKG_VERSION"));

/// Source of raw tile bytes.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// Fetch the raw (still encoded) tile at `url`.
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// HTTP implementation of [`TileFetcher`].
#[derive(Clone)]
pub struct HttpTileFetcher {
    client: reqwest::Client,
}

impl HttpTileFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Request {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        trace!(url, "GET tile");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Request {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Request {
                    url: url.to_string(),
                    message: format!("Failed to read response: {}", e),
                }
            }
        })
    }
}
