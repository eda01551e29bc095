//! Turnstile `siteverify` client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use keystone_common::RelayError;
use std::time::Duration;

use super::{CaptchaVerifier, SiteVerifyRequest, SiteVerifyResponse};
use crate::outbound::map_transport_error;

/// Verifies tokens against Cloudflare Turnstile
pub struct TurnstileVerifier {
    client: reqwest::Client,
    verify_url: String,
}

impl TurnstileVerifier {
    pub fn new(verify_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Turnstile HTTP client")?;

        Ok(Self {
            client,
            verify_url: verify_url.to_string(),
        })
    }
}

#[async_trait]
impl CaptchaVerifier for TurnstileVerifier {
    async fn verify(&self, request: &SiteVerifyRequest) -> Result<SiteVerifyResponse, RelayError> {
        let response = self
            .client
            .post(&self.verify_url)
            .form(request)
            .send()
            .await
            .map_err(|e| map_transport_error("turnstile", e))?;

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read siteverify body");
                String::new()
            }
        };

        let verdict = SiteVerifyResponse::from_body(&body);
        if !verdict.success {
            tracing::debug!(error_codes = ?verdict.error_codes, "Turnstile rejected token");
        }

        Ok(verdict)
    }
}
