//! HTTP client for getcid.info.

use anyhow::{Context, Result};
use async_trait::async_trait;
use keystone_common::RelayError;
use std::time::Duration;

use super::LookupApi;
use crate::outbound::map_transport_error;

pub struct GetCidClient {
    client: reqwest::Client,
    base_url: String,
}

impl GetCidClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build getcid HTTP client")?;

        Ok(Self::from_client(client, base_url))
    }

    /// Wrap a preconfigured client (timeout, proxy settings)
    pub fn from_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/{iid}/{token}` with both segments percent-encoded
    fn lookup_url(&self, iid: &str, token: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(iid),
            urlencoding::encode(token)
        )
    }
}

#[async_trait]
impl LookupApi for GetCidClient {
    async fn fetch(&self, iid: &str, token: &str) -> Result<String, RelayError> {
        let response = self
            .client
            .get(self.lookup_url(iid, token))
            .send()
            .await
            .map_err(|e| map_transport_error("getcid", e))?;

        let status = response.status();
        match response.text().await {
            Ok(body) => {
                tracing::debug!(status = status.as_u16(), bytes = body.len(), "getcid replied");
                Ok(body)
            }
            Err(e) => {
                tracing::warn!(status = status.as_u16(), error = %e, "Failed to read getcid body");
                Ok(String::new())
            }
        }
    }
}
