//! # Keystone Common
//!
//! Shared types, error taxonomy, and constants for the Keystone CID relay.
//!
//! ## Modules
//! - `types` - Request/response payloads and identifier policy
//! - `upstream` - Classification of raw getcid replies
//! - `error` - Relay error taxonomy with HTTP status mapping
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod types;
pub mod upstream;

pub use error::RelayError;
pub use types::*;
pub use upstream::{UpstreamErrorKind, UpstreamReply};
