//! Shared constants for Keystone components.

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

/// Digits required in an installation ID under the strict policy
pub const REQUIRED_IID_DIGITS: usize = 63;

/// Lifetime of a cached CID (30 days)
pub const CID_CACHE_TTL_SECS: u64 = 60 * 60 * 24 * 30;

/// Cloudflare Turnstile verification endpoint
pub const TURNSTILE_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// getcid lookup API base (`{base}/{iid}/{token}`)
pub const GETCID_BASE_URL: &str = "https://getcid.info/api";

/// Timeout for the Turnstile verification call
pub const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 5;

/// Timeout for the getcid lookup call
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;

/// Requests allowed per client IP per window on `/api/`
pub const DEFAULT_RATE_LIMIT_MAX: u64 = 10;

/// Rate limit window (1 minute)
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Upper bound on an inbound request body
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Redis key prefixes
pub mod redis_keys {
    /// Cached CID: cid:{iid}
    pub const CID_PREFIX: &str = "cid:";

    /// Rate limit counters: ratelimit:{client_ip}
    pub const RATELIMIT_PREFIX: &str = "ratelimit:";
}

/// HTTP header names
pub mod headers {
    /// Client IP as seen by Cloudflare's edge
    pub const CF_CONNECTING_IP: &str = "CF-Connecting-IP";

    /// Proxy chain, left-most entry is the original client
    pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";

    pub const RATELIMIT_POLICY: &str = "RateLimit-Policy";
    pub const RATELIMIT_LIMIT: &str = "RateLimit-Limit";
    pub const RATELIMIT_REMAINING: &str = "RateLimit-Remaining";
    pub const RATELIMIT_RESET: &str = "RateLimit-Reset";
}

/// User-facing messages
pub mod messages {
    pub const CAPTCHA_MISSING: &str = "Please complete the captcha.";
    pub const CAPTCHA_REJECTED: &str = "Captcha verification failed. Please try again.";
    pub const TURNSTILE_UNCONFIGURED: &str = "Captcha verification is not configured on this server.";
    pub const GETCID_UNPROVISIONED: &str = "The CID lookup service is not set up yet. Please try again later.";
    pub const UPSTREAM_EMPTY: &str = "Empty response from getcid.";
    pub const UPSTREAM_TIMEOUT: &str = "The lookup service did not respond in time. Please try again.";
    pub const SERVER_ERROR: &str = "Server error";
    pub const TOO_MANY_REQUESTS: &str = "Too many requests. Please wait and try again.";
}
