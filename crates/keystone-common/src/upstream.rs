//! Classification of raw getcid replies.
//!
//! getcid answers with plain text: a bare run of digits on success, or a
//! human-readable message otherwise. Messages are sorted into categories by
//! case-insensitive substring matching, first group wins.

use serde::{Deserialize, Serialize};

use crate::types::is_cid;

/// Category of a non-numeric getcid reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamErrorKind {
    /// API token missing, unknown, or used up
    Token,
    /// Caller (our IP) is throttled or locked
    RateLimited,
    /// The installation ID was refused
    Identifier,
    /// getcid is overloaded or failing
    Busy,
    /// Anything not recognized
    Unknown,
}

/// Ordered match table. Order matters: token issues are checked before rate
/// limits, rate limits before identifier issues, identifier issues before
/// server-busy.
const MATCH_TABLE: &[(UpstreamErrorKind, &[&str])] = &[
    (
        UpstreamErrorKind::Token,
        &["token cannot be empty", "token does not exist", "used 5/5"],
    ),
    (
        UpstreamErrorKind::RateLimited,
        &["reach request limit", "being locked", "your ip", "locked", "blocked"],
    ),
    (
        UpstreamErrorKind::Identifier,
        &[
            "wrong iid",
            "blocked iid",
            "exceeded iid",
            "need to call",
            "not legimate",
            "maybe blocked",
        ],
    ),
    (UpstreamErrorKind::Busy, &["server too busy", "server error"]),
];

impl UpstreamErrorKind {
    /// Classify an error message (case-insensitive)
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        MATCH_TABLE
            .iter()
            .find(|(_, needles)| needles.iter().any(|needle| lower.contains(needle)))
            .map(|(kind, _)| *kind)
            .unwrap_or(Self::Unknown)
    }

    /// HTTP status relayed to the client for this category
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Token => 401,
            Self::RateLimited => 429,
            Self::Identifier => 400,
            Self::Busy => 503,
            Self::Unknown => 502,
        }
    }
}

/// A getcid reply after trimming and classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamReply {
    /// Nothing (or only whitespace) came back
    Empty,
    /// Confirmation ID, all ASCII digits
    Cid(String),
    /// Error text with its original casing
    Error {
        message: String,
        kind: UpstreamErrorKind,
    },
}

impl UpstreamReply {
    pub fn classify(raw: &str) -> Self {
        let body = raw.trim();
        if body.is_empty() {
            Self::Empty
        } else if is_cid(body) {
            Self::Cid(body.to_string())
        } else {
            Self::Error {
                message: body.to_string(),
                kind: UpstreamErrorKind::classify(body),
            }
        }
    }
}
