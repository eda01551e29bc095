//! Redis backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{CidCache, RequestCounter, WindowHit};
use keystone_common::constants::redis_keys;

/// Redis-backed store (auto-reconnecting connection manager)
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    cid_prefix: String,
}

impl RedisStore {
    /// Connect to Redis
    pub async fn connect(redis_url: &str, cid_prefix: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            conn,
            cid_prefix: cid_prefix.to_string(),
        })
    }

    fn cid_key(&self, iid: &str) -> String {
        format!("{}{}", self.cid_prefix, iid)
    }
}

#[async_trait]
impl CidCache for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(self.cid_key(key))
            .await
            .context("Redis GET failed")?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.cid_key(key), value, ttl_secs)
            .await
            .context("Redis SETEX failed")?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING failed")?;
        Ok(())
    }
}

#[async_trait]
impl RequestCounter for RedisStore {
    async fn hit(&self, key: &str, window_secs: u64) -> Result<WindowHit> {
        let mut conn = self.conn.clone();
        let key = format!("{}{}", redis_keys::RATELIMIT_PREFIX, key);

        let count: u64 = conn.incr(&key, 1).await.context("Redis INCR failed")?;
        let ttl: i64 = conn.ttl(&key).await.context("Redis TTL failed")?;

        // Start the window on the first hit, and re-arm a key left without
        // an expiry by an earlier EXPIRE that never landed
        let (needs_expiry, reset_secs) = window_state(count, ttl, window_secs);
        if needs_expiry {
            conn.expire::<_, ()>(&key, window_secs as i64)
                .await
                .context("Redis EXPIRE failed")?;
        }

        Ok(WindowHit { count, reset_secs })
    }
}

/// Whether the counter key needs an EXPIRE, and the seconds left in the
/// window. `ttl` is the Redis TTL reply: -1 means the key has no expiry.
fn window_state(count: u64, ttl: i64, window_secs: u64) -> (bool, u64) {
    if count == 1 || ttl < 0 {
        (true, window_secs)
    } else {
        (false, (ttl as u64).max(1))
    }
}
