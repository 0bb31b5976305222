use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::FeedConfig;
use crate::error::AppError;

use super::types::FeedResponse;

/// HTTP client for the upstream dice notify endpoint.
pub struct FeedClient {
    http: reqwest::Client,
    base_url: String,
    platform_id: String,
}

impl FeedClient {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let timeout_ms = config
            .request_timeout_ms()
            .context("feed.request_timeout is invalid")?;
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .context("failed to build feed HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            platform_id: config.platform_id.clone(),
        })
    }

    /// Fetch one notify batch for `gid`. A non-`OK` status is an error.
    pub async fn fetch(&self, gid: &str) -> Result<FeedResponse> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[("platform_id", self.platform_id.as_str()), ("gid", gid)])
            .send()
            .await
            .with_context(|| format!("feed request for {} failed", gid))?
            .error_for_status()
            .with_context(|| format!("feed returned error status for {}", gid))?;

        let body = resp
            .text()
            .await
            .with_context(|| format!("failed to read feed body for {}", gid))?;
        let parsed: FeedResponse = serde_json::from_str(&body)
            .map_err(AppError::from)
            .with_context(|| format!("malformed feed payload for {}", gid))?;

        if !parsed.is_ok() {
            return Err(AppError::FeedStatus {
                gid: gid.to_string(),
                status: parsed.status,
            }
            .into());
        }

        tracing::debug!(gid, items = parsed.data.len(), "Fetched feed batch");
        Ok(parsed)
    }
}
