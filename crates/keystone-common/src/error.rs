//! Error taxonomy for the CID relay.

use thiserror::Error;

use crate::constants::messages;
use crate::upstream::UpstreamErrorKind;

/// Every way a lookup can fail, as seen by the client
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed or missing request fields
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A required server-side secret is missing
    #[error("Misconfigured: {0}")]
    Misconfigured(String),

    /// The lookup service has not been provisioned yet (soft launch)
    #[error("Not provisioned: {0}")]
    Unprovisioned(String),

    /// Turnstile refused the token
    #[error("Captcha rejected")]
    CaptchaRejected,

    /// getcid answered with an empty body
    #[error("Empty upstream response")]
    UpstreamEmpty,

    /// getcid answered with an error message
    #[error("Upstream error ({kind:?}): {message}")]
    Upstream {
        message: String,
        kind: UpstreamErrorKind,
    },

    /// An outbound call exceeded its timeout
    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),

    /// Anything unexpected; details stay in the logs
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Misconfigured(_) => 500,
            Self::Unprovisioned(_) => 503,
            Self::CaptchaRejected => 403,
            Self::UpstreamEmpty => 502,
            Self::Upstream { kind, .. } => kind.status_code(),
            Self::UpstreamTimeout(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    /// Text safe to return in the `error` field
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) | Self::Misconfigured(msg) | Self::Unprovisioned(msg) => {
                msg.clone()
            }
            Self::CaptchaRejected => messages::CAPTCHA_REJECTED.to_string(),
            Self::UpstreamEmpty => messages::UPSTREAM_EMPTY.to_string(),
            Self::Upstream { message, .. } => message.clone(),
            Self::UpstreamTimeout(_) => messages::UPSTREAM_TIMEOUT.to_string(),
            Self::Internal(_) => messages::SERVER_ERROR.to_string(),
        }
    }
}
