//! HTTP artifact fetcher.

use super::{unavailable, ArtifactFetcher};
use crate::error::{ZkError, ZkResult};
use async_trait::async_trait;
use std::time::Duration;

/// Downloads `{base_url}/{backend}/{artifact}`.
#[derive(Debug, Clone)]
pub struct RemoteFileFetcher {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteFileFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ZkResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ZkError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn url_for(&self, backend: &str, artifact: &str) -> String {
        format!("{}/{}/{}", self.base_url, backend, artifact)
    }
}

#[async_trait]
impl ArtifactFetcher for RemoteFileFetcher {
    async fn fetch(&self, backend: &str, artifact: &str) -> ZkResult<Vec<u8>> {
        let url = self.url_for(backend, artifact);
        tracing::debug!(%url, "downloading artifact");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(backend, artifact, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(
                backend,
                artifact,
                format!("fetch failed with code: {}", status.as_u16()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| unavailable(backend, artifact, e))?;
        Ok(bytes.to_vec())
    }
}
