//! Configuration management for Keystone.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

use keystone_common::IdentifierPolicy;
use keystone_common::constants::{
    CID_CACHE_TTL_SECS, DEFAULT_LISTEN_ADDR, DEFAULT_LOOKUP_TIMEOUT_SECS, DEFAULT_RATE_LIMIT_MAX,
    DEFAULT_RATE_LIMIT_WINDOW_SECS, DEFAULT_VERIFY_TIMEOUT_SECS, GETCID_BASE_URL,
    TURNSTILE_VERIFY_URL, redis_keys,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Redis connection URL (cache and rate-limit counters)
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Accepted installation ID shape
    #[serde(default)]
    pub identifier: IdentifierPolicy,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub turnstile: TurnstileConfig,

    #[serde(default)]
    pub lookup: LookupConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Directory with the front-end page, served for unmatched paths
    #[serde(default)]
    pub static_dir: Option<String>,

    #[serde(default)]
    pub secrets: Secrets,
}

/// Where cached CIDs live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Unset: Redis when a Redis URL is configured, otherwise no cache
    #[serde(default)]
    pub backend: Option<CacheBackend>,

    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: None,
            ttl_secs: default_cache_ttl(),
            key_prefix: default_key_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnstileConfig {
    #[serde(default = "default_verify_url")]
    pub verify_url: String,

    #[serde(default = "default_verify_timeout")]
    pub timeout_secs: u64,
}

impl Default for TurnstileConfig {
    fn default() -> Self {
        Self {
            verify_url: default_verify_url(),
            timeout_secs: default_verify_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_lookup_url")]
    pub base_url: String,

    #[serde(default = "default_lookup_timeout")]
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: default_lookup_url(),
            timeout_secs: default_lookup_timeout(),
        }
    }
}

/// Per-IP limit on `/api/`
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum requests per window per client IP
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    #[serde(default = "default_window")]
    pub window_secs: u64,

    /// Key clients by `CF-Connecting-IP` / `X-Forwarded-For` rather than the
    /// socket peer. Only safe behind a proxy that sets these headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_max_requests(),
            window_secs: default_window(),
            trust_proxy_headers: false,
        }
    }
}

/// Server-side secrets. Usually supplied through the environment.
#[derive(Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub turnstile_secret: Option<String>,

    #[serde(default)]
    pub getcid_token: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Secrets")
            .field("turnstile_secret", &redact(&self.turnstile_secret))
            .field("getcid_token", &redact(&self.getcid_token))
            .finish()
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_cache_ttl() -> u64 { CID_CACHE_TTL_SECS } // 30 days
fn default_key_prefix() -> String { redis_keys::CID_PREFIX.to_string() }
fn default_verify_url() -> String { TURNSTILE_VERIFY_URL.to_string() }
fn default_verify_timeout() -> u64 { DEFAULT_VERIFY_TIMEOUT_SECS }
fn default_lookup_url() -> String { GETCID_BASE_URL.to_string() }
fn default_lookup_timeout() -> u64 { DEFAULT_LOOKUP_TIMEOUT_SECS }
fn default_true() -> bool { true }
fn default_max_requests() -> u64 { DEFAULT_RATE_LIMIT_MAX }
fn default_window() -> u64 { DEFAULT_RATE_LIMIT_WINDOW_SECS } // 1 minute

/// Values that override the file (CLI flags or environment)
#[derive(Debug, Default)]
pub struct Overrides {
    pub listen: Option<String>,
    pub redis_url: Option<String>,
    pub turnstile_secret: Option<String>,
    pub getcid_token: Option<String>,
    pub static_dir: Option<String>,
}

impl AppConfig {
    /// Load configuration from file, with CLI/env overrides
    pub fn load(config_path: &str, overrides: Overrides) -> Result<Self> {
        let config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        Ok(config.with_overrides(overrides))
    }

    fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(listen) = overrides.listen {
            self.listen_addr = listen;
        }
        if overrides.redis_url.is_some() {
            self.redis_url = overrides.redis_url;
        }
        if overrides.turnstile_secret.is_some() {
            self.secrets.turnstile_secret = overrides.turnstile_secret;
        }
        if overrides.getcid_token.is_some() {
            self.secrets.getcid_token = overrides.getcid_token;
        }
        if overrides.static_dir.is_some() {
            self.static_dir = overrides.static_dir;
        }

        // Blank environment variables count as unset
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&self.secrets.turnstile_secret) {
            self.secrets.turnstile_secret = None;
        }
        if blank(&self.secrets.getcid_token) {
            self.secrets.getcid_token = None;
        }
        if blank(&self.redis_url) {
            self.redis_url = None;
        }

        self
    }

    /// Cache backend after applying the Redis-if-available default
    pub fn cache_backend(&self) -> CacheBackend {
        match (self.cache.backend, &self.redis_url) {
            (Some(backend), _) => backend,
            (None, Some(_)) => CacheBackend::Redis,
            (None, None) => CacheBackend::None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            redis_url: None,
            identifier: IdentifierPolicy::default(),
            cache: CacheConfig::default(),
            turnstile: TurnstileConfig::default(),
            lookup: LookupConfig::default(),
            rate_limit: RateLimitConfig::default(),
            static_dir: None,
            secrets: Secrets::default(),
        }
    }
}
