//! TTL key/value cache shared by every API client.
//!
//! Each client owns one `TtlCache` namespace. Entries carry their own expiry
//! instant, checked against the injected clock on every read, so an expired
//! entry is never returned even if moka has not evicted it yet.

use crate::clock::SharedClock;
use chrono::{DateTime, Duration, Utc};
use moka::future::Cache;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

pub struct TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    namespace: String,
    ttl: Duration,
    clock: SharedClock,
    inner: Cache<String, CacheEntry<V>>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(namespace: impl Into<String>, ttl_secs: u64, clock: SharedClock) -> Self {
        let inner = Cache::builder()
            .time_to_live(std::time::Duration::from_secs(ttl_secs.max(1)))
            .max_capacity(10_000)
            .build();

        Self {
            namespace: namespace.into(),
            ttl: Duration::seconds(ttl_secs as i64),
            clock,
            inner,
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let full_key = self.key(key);
        let entry = self.inner.get(&full_key).await?;
        if self.clock.now() >= entry.expires_at {
            self.inner.invalidate(&full_key).await;
            return None;
        }
        tracing::debug!("Cache hit: {}", full_key);
        Some(entry.value)
    }

    pub async fn set(&self, key: &str, value: V) {
        self.insert(key, value, self.ttl).await;
    }

    /// Stores with an explicit TTL, capped by the namespace TTL moka enforces.
    pub async fn set_with_ttl(&self, key: &str, value: V, ttl_secs: u64) {
        let ttl = Duration::seconds(ttl_secs as i64).min(self.ttl);
        self.insert(key, value, ttl).await;
    }

    async fn insert(&self, key: &str, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: self.clock.now() + ttl,
        };
        self.inner.insert(self.key(key), entry).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(&self.key(key)).await;
    }

    /// Number of stored entries, expired ones included until next read.
    pub async fn len(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache: TtlCache<String> =
            TtlCache::new("company", 60, Arc::new(ManualClock::default()));
        cache.set("11222333000181", "ACME".to_string()).await;
        assert_eq!(cache.get("11222333000181").await.as_deref(), Some("ACME"));
        assert_eq!(cache.get("other").await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent() {
        let clock = ManualClock::default();
        let cache: TtlCache<u32> = TtlCache::new("social", 3_600, Arc::new(clock.clone()));
        cache.set("pizzaria", 42).await;

        clock.advance(Duration::seconds(3_599));
        assert_eq!(cache.get("pizzaria").await, Some(42));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get("pizzaria").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_and_namespaces() {
        let clock: SharedClock = Arc::new(ManualClock::default());
        let a: TtlCache<u32> = TtlCache::new("a", 60, clock.clone());
        let b: TtlCache<u32> = TtlCache::new("b", 60, clock);
        a.set("k", 1).await;
        b.set("k", 2).await;
        assert_eq!(a.get("k").await, Some(1));
        assert_eq!(b.get("k").await, Some(2));

        a.invalidate("k").await;
        assert_eq!(a.get("k").await, None);
        assert_eq!(a.namespace(), "a");
    }

    #[tokio::test]
    async fn test_shorter_entry_ttl() {
        let clock = ManualClock::default();
        let cache: TtlCache<u32> = TtlCache::new("geo", 86_400, Arc::new(clock.clone()));
        cache.set_with_ttl("short", 1, 10).await;
        cache.set("long", 2).await;
        assert_eq!(cache.len().await, 2);

        clock.advance(Duration::seconds(10));
        assert_eq!(cache.get("short").await, None);
        assert_eq!(cache.get("long").await, Some(2));
    }
}
