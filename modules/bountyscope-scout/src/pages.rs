use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use bountyscope_common::is_valid_url;

use crate::error::ScoutError;

/// Fetches raw HTML for a listing page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain HTTP GET with a browser-like user agent.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to build page HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        if !is_valid_url(url) {
            return Err(ScoutError::InvalidUrl(url.to_string()).into());
        }

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScoutError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = resp.text().await.with_context(|| format!("reading body of {url}"))?;
        debug!(url, bytes = body.len(), "Fetched page");
        Ok(body)
    }
}
