//! In-process backend for single-node deployments and tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{CidCache, RequestCounter, WindowHit};

#[derive(Default)]
pub struct MemoryStore {
    /// iid -> (cid, expires_at)
    cids: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
    /// key -> (count, window_start)
    windows: Mutex<HashMap<String, (u64, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let mut cids = self.cids.lock().await;
        match cids.get(key) {
            Some((value, expires_at)) if *expires_at > now => Some(value.clone()),
            Some(_) => {
                cids.remove(key);
                None
            }
            None => None,
        }
    }

    async fn put_at(&self, key: &str, value: &str, ttl_secs: u64, now: DateTime<Utc>) {
        let expires_at = now + Duration::seconds(ttl_secs as i64);
        let mut cids = self.cids.lock().await;

        // Purge entries that expired without being read again
        cids.retain(|_, (_, expires)| *expires > now);
        cids.insert(key.to_string(), (value.to_string(), expires_at));
    }

    async fn hit_at(&self, key: &str, window_secs: u64, now: DateTime<Utc>) -> WindowHit {
        let window = Duration::seconds(window_secs as i64);
        let mut windows = self.windows.lock().await;

        // Drop finished windows so idle clients don't accumulate
        windows.retain(|_, (_, started)| now - *started < window);

        let entry = windows.entry(key.to_string()).or_insert((0, now));
        entry.0 += 1;

        let elapsed = (now - entry.1).num_seconds().max(0) as u64;
        WindowHit {
            count: entry.0,
            reset_secs: window_secs.saturating_sub(elapsed).max(1),
        }
    }
}

#[async_trait]
impl CidCache for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_at(key, Utc::now()).await)
    }

    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.put_at(key, value, ttl_secs, Utc::now()).await;
        Ok(())
    }
}

#[async_trait]
impl RequestCounter for MemoryStore {
    async fn hit(&self, key: &str, window_secs: u64) -> Result<WindowHit> {
        Ok(self.hit_at(key, window_secs, Utc::now()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_entry_expires() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store.put_at("111", "999", 60, now).await;
        assert_eq!(store.get_at("111", now).await.as_deref(), Some("999"));
        assert_eq!(
            store.get_at("111", now + Duration::seconds(59)).await.as_deref(),
            Some("999")
        );
        assert_eq!(store.get_at("111", now + Duration::seconds(60)).await, None);
        // Expired entry was evicted
        assert!(store.cids.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_put_purges_expired_entries() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store.put_at("old-1", "1", 60, now).await;
        store.put_at("old-2", "2", 60, now).await;
        store.put_at("live", "3", 600, now).await;

        // Never read again, but a later write sweeps them out
        store.put_at("new", "4", 60, now + Duration::seconds(120)).await;

        let cids = store.cids.lock().await;
        let mut keys: Vec<&str> = cids.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["live", "new"]);
    }

    #[tokio::test]
    async fn test_cache_roundtrip_via_trait() {
        let store = MemoryStore::new();
        assert_eq!(CidCache::get(&store, "missing").await.unwrap(), None);
        tokio_test::assert_ok!(CidCache::put(&store, "k", "v", 30).await);
        assert_eq!(CidCache::get(&store, "k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_window_counts_and_resets() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let first = store.hit_at("1.2.3.4", 60, now).await;
        assert_eq!(first, WindowHit { count: 1, reset_secs: 60 });

        let second = store.hit_at("1.2.3.4", 60, now + Duration::seconds(15)).await;
        assert_eq!(second, WindowHit { count: 2, reset_secs: 45 });

        // Other clients have their own window
        let other = store.hit_at("5.6.7.8", 60, now + Duration::seconds(15)).await;
        assert_eq!(other.count, 1);

        let fresh = store.hit_at("1.2.3.4", 60, now + Duration::seconds(61)).await;
        assert_eq!(fresh.count, 1);
    }
}
