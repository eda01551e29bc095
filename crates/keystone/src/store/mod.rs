//! Key-value backends for the CID cache and the rate-limit counters.
//!
//! Both are best effort: callers log failures and carry on.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use anyhow::Result;
use async_trait::async_trait;

/// Cache of confirmation IDs, keyed by normalized installation ID
#[async_trait]
pub trait CidCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Backend liveness, used by the readiness probe
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Current state of a fixed-window counter after a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Hits in the current window, including this one
    pub count: u64,
    /// Seconds until the window resets
    pub reset_secs: u64,
}

/// Fixed-window request counter
#[async_trait]
pub trait RequestCounter: Send + Sync {
    async fn hit(&self, key: &str, window_secs: u64) -> Result<WindowHit>;
}
