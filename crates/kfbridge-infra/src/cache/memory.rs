//! In-memory context cache.
//!
//! `DashMap` of key -> (value, expiry instant). Expired entries are removed
//! lazily on access, and the whole map is swept every [`SWEEP_EVERY`] writes
//! and on `keys`. Contents do not survive restarts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use kfbridge_core::cache::ContextCache;
use kfbridge_types::error::CacheError;

/// Writes between full sweeps of expired entries.
pub const SWEEP_EVERY: u64 = 128;

#[derive(Debug, Default)]
pub struct MemoryContextCache {
    entries: DashMap<String, (String, Instant)>,
    writes: AtomicU64,
}

impl MemoryContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, (_, expires)| *expires > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "purged expired contexts");
        }
        removed
    }
}

fn deadline(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl).unwrap_or(now + Duration::from_secs(u32::MAX as u64))
}

impl ContextCache for MemoryContextCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let live = self
            .entries
            .get(key)
            .map(|entry| (entry.1 > now).then(|| entry.0.clone()));
        match live {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, (_, expires)| *expires <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (value.to_string(), deadline(ttl)));
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.1 > now => {
                entry.1 = deadline(ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn del(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, (_, expires))| expires > now))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        self.purge_expired();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_set_get_and_expiry() {
        let cache = MemoryContextCache::new();
        cache.set_ex("live", "v", HOUR).await.unwrap();
        cache.set_ex("dead", "v", Duration::ZERO).await.unwrap();

        assert_eq!(cache.get("live").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.get("dead").await.unwrap(), None);
        assert_eq!(cache.len(), 1, "expired entry removed on read");
    }

    #[tokio::test]
    async fn test_expire_only_live_keys() {
        let cache = MemoryContextCache::new();
        cache.set_ex("k", "v", Duration::ZERO).await.unwrap();
        assert!(!cache.expire("k", HOUR).await.unwrap());

        cache.set_ex("k", "v", HOUR).await.unwrap();
        assert!(cache.expire("k", HOUR).await.unwrap());
        assert!(!cache.expire("missing", HOUR).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_sweeps_and_filters() {
        let cache = MemoryContextCache::new();
        cache.set_ex("p:b", "1", HOUR).await.unwrap();
        cache.set_ex("p:a", "1", HOUR).await.unwrap();
        cache.set_ex("p:old", "1", Duration::ZERO).await.unwrap();
        cache.set_ex("q:c", "1", HOUR).await.unwrap();

        assert_eq!(cache.keys("p:").await.unwrap(), vec!["p:a", "p:b"]);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_del_and_close() {
        let cache = MemoryContextCache::new();
        cache.set_ex("k", "v", HOUR).await.unwrap();
        assert!(cache.del("k").await.unwrap());
        assert!(!cache.del("k").await.unwrap());

        cache.set_ex("k", "v", HOUR).await.unwrap();
        cache.close().await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_del_reports_only_live_keys() {
        let cache = MemoryContextCache::new();
        cache.set_ex("k", "v", Duration::ZERO).await.unwrap();
        assert!(!cache.del("k").await.unwrap());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_writes_sweep_expired_entries() {
        let cache = MemoryContextCache::new();
        for i in 0..1000 {
            cache
                .set_ex(&format!("gone:{i}"), "v", Duration::from_millis(1))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        for i in 0..SWEEP_EVERY {
            cache.set_ex(&format!("live:{i}"), "v", HOUR).await.unwrap();
        }

        // The sweep on write 1024 dropped every stale entry.
        assert_eq!(cache.len(), SWEEP_EVERY as usize);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_overflow() {
        let cache = MemoryContextCache::new();
        cache.set_ex("k", "v", Duration::MAX).await.unwrap();
        assert!(cache.get("k").await.unwrap().is_some());
    }
}
