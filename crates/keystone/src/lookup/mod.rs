//! getcid lookup API.

mod getcid;

pub use getcid::GetCidClient;

use async_trait::async_trait;
use keystone_common::RelayError;

#[async_trait]
pub trait LookupApi: Send + Sync {
    /// Fetch the raw text reply for an installation ID.
    ///
    /// An unreadable body comes back as an empty string; only transport
    /// failures are errors.
    async fn fetch(&self, iid: &str, token: &str) -> Result<String, RelayError>;
}
