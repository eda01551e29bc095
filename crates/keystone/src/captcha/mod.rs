//! Captcha verification.
//!
//! Tokens are produced by the Turnstile widget in the browser and checked
//! server-side against Cloudflare's `siteverify` endpoint.

mod verifier;

pub use verifier::TurnstileVerifier;

use async_trait::async_trait;
use keystone_common::RelayError;
use serde::{Deserialize, Serialize};

/// Form fields posted to `siteverify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteVerifyRequest {
    pub secret: String,
    pub response: String,
    /// Omitted from the form when unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remoteip: Option<String>,
}

/// The part of the `siteverify` reply we read.
///
/// An unparseable reply is treated as `Default`, i.e. a failed verification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteVerifyResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, rename = "error-codes")]
    pub error_codes: Vec<String>,
}

impl SiteVerifyResponse {
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable siteverify reply, treating as failure");
                Self::default()
            }
        }
    }
}

#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Ask the verification service about a token
    async fn verify(&self, request: &SiteVerifyRequest) -> Result<SiteVerifyResponse, RelayError>;
}
