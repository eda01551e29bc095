//! Application state and shared resources.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::captcha::TurnstileVerifier;
use crate::config::{AppConfig, CacheBackend};
use crate::lookup::GetCidClient;
use crate::ratelimit::RateLimiter;
use crate::service::{CidService, RelaySettings};
use crate::store::{CidCache, MemoryStore, RedisStore, RequestCounter};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// CID lookup flow
    pub service: Arc<CidService>,

    /// Per-IP limiter for `/api/` (absent when disabled)
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    /// Build state from configuration, connecting to Redis when configured
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let redis = match &config.redis_url {
            Some(url) => Some(RedisStore::connect(url, &config.cache.key_prefix).await?),
            None => None,
        };
        // Shared by cache and counters when Redis is not available
        let memory = Arc::new(MemoryStore::new());

        let cache: Option<Arc<dyn CidCache>> = match config.cache_backend() {
            CacheBackend::Redis => match &redis {
                Some(store) => Some(Arc::new(store.clone()) as Arc<dyn CidCache>),
                None => {
                    tracing::warn!("Redis cache requested but no redis_url set, caching disabled");
                    None
                }
            },
            CacheBackend::Memory => Some(memory.clone() as Arc<dyn CidCache>),
            CacheBackend::None => None,
        };

        let rate_limiter = if config.rate_limit.enabled {
            let counter: Arc<dyn RequestCounter> = match &redis {
                Some(store) => Arc::new(store.clone()) as Arc<dyn RequestCounter>,
                None => memory.clone() as Arc<dyn RequestCounter>,
            };
            Some(Arc::new(
                RateLimiter::new(
                    counter,
                    config.rate_limit.max_requests,
                    config.rate_limit.window_secs,
                )
                .trust_proxy_headers(config.rate_limit.trust_proxy_headers),
            ))
        } else {
            None
        };

        let verifier = TurnstileVerifier::new(
            &config.turnstile.verify_url,
            Duration::from_secs(config.turnstile.timeout_secs),
        )?;
        let lookup = GetCidClient::new(
            &config.lookup.base_url,
            Duration::from_secs(config.lookup.timeout_secs),
        )?;

        let settings = RelaySettings {
            turnstile_secret: config.secrets.turnstile_secret.clone(),
            getcid_token: config.secrets.getcid_token.clone(),
            identifier_policy: config.identifier,
            cache_ttl_secs: config.cache.ttl_secs,
        };

        let service = CidService::new(settings, Arc::new(verifier), Arc::new(lookup), cache);

        Ok(Self::from_parts(service, rate_limiter))
    }

    pub fn from_parts(service: CidService, rate_limiter: Option<Arc<RateLimiter>>) -> Self {
        Self {
            service: Arc::new(service),
            rate_limiter,
        }
    }
}
