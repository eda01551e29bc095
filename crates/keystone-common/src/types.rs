//! Core types shared across Keystone components.

use serde::{Deserialize, Serialize};

use crate::constants::REQUIRED_IID_DIGITS;

/// Strip everything but ASCII digits from a raw installation ID
pub fn normalize_identifier(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Returns true for a non-empty string made only of ASCII digits
pub fn is_cid(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Accepted length of a normalized installation ID.
///
/// A deployment runs exactly one policy. The strict one (`Exact(63)`) is the
/// default; `AtLeast` exists for lenient front-ends that send partial IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "digits", rename_all = "snake_case")]
pub enum IdentifierPolicy {
    Exact(usize),
    AtLeast(usize),
}

impl IdentifierPolicy {
    pub fn accepts(&self, normalized: &str) -> bool {
        match *self {
            Self::Exact(n) => normalized.len() == n,
            Self::AtLeast(n) => normalized.len() >= n,
        }
    }

    /// Message shown when an ID is refused
    pub fn rejection_message(&self) -> String {
        match *self {
            Self::Exact(n) => format!("Wrong IID. Must be {} digits.", n),
            Self::AtLeast(n) => format!("Wrong IID. Must be at least {} digits.", n),
        }
    }
}

impl Default for IdentifierPolicy {
    fn default() -> Self {
        Self::Exact(REQUIRED_IID_DIGITS)
    }
}

/// A validated-shape lookup request.
///
/// `identifier` is always the digits-only form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub identifier: String,
    pub captcha_token: String,
}

impl LookupRequest {
    /// Build from a JSON body. Anything that is not an object is treated as
    /// an empty object, and missing fields become empty strings.
    pub fn from_json(body: &serde_json::Value) -> Self {
        let field = |name: &str| body.get(name).map(coerce_to_string).unwrap_or_default();
        Self {
            identifier: normalize_identifier(field("id").trim()),
            captcha_token: field("tsToken").trim().to_string(),
        }
    }
}

/// Loose string coercion for body fields, following JavaScript's
/// `String(x || "")` for scalars: strings as-is, non-zero numbers in decimal,
/// `true` as "true", and falsy values (`""`, `0`, `false`, `null`) empty.
///
/// Objects and arrays become "" rather than "[object Object]" or their joined
/// elements, so a token sent as an object is refused as missing instead of
/// being forwarded to Turnstile.
fn coerce_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) if n.as_f64() != Some(0.0) => n.to_string(),
        serde_json::Value::Bool(true) => "true".to_string(),
        _ => String::new(),
    }
}

/// Successful lookup payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidResponse {
    pub cid: String,
    pub cached: bool,
}

/// Error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
