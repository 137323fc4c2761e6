//! Downloading remote images to local disk.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use stillcast_common::{Error, Result};

/// Downloads a URL to a file.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` into `dest`, failing with [`Error::Fetch`] on a network
    /// error, a timeout, or a non-2xx response.
    async fn fetch(&self, url: &str, dest: &Path, timeout: Duration) -> Result<()>;
}

/// Build the shared HTTP client: fixed user agent, redirects followed.
pub fn build_client(user_agent: &str) -> Client {
    Client::builder()
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client with user agent: {}", e);
            Client::new()
        })
}

/// [`Fetcher`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: build_client(user_agent),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path, timeout: Duration) -> Result<()> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::fetch(url, e))?;

        let body = response.bytes().await.map_err(|e| Error::fetch(url, e))?;
        tokio::fs::write(dest, &body).await?;

        tracing::debug!(url, bytes = body.len(), dest = %dest.display(), "Downloaded image");
        Ok(())
    }
}
