//! Shared handling for outbound HTTP failures.

use keystone_common::RelayError;

/// Map a transport failure to the relay taxonomy. Timeouts get their own
/// variant; everything else is internal and only logged.
pub fn map_transport_error(service: &'static str, err: reqwest::Error) -> RelayError {
    // getcid URLs carry the API token
    let err = err.without_url();
    if err.is_timeout() {
        tracing::warn!(service, error = %err, "Outbound call timed out");
        RelayError::UpstreamTimeout(format!("{} timed out", service))
    } else {
        tracing::error!(service, error = %err, "Outbound call failed");
        RelayError::Internal(format!("{} request failed: {}", service, err))
    }
}
