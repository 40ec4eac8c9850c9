//! In-memory cache backend
//!
//! Entries live in a HashMap guarded by one mutex together with a sorted
//! (expiry, key) index. Expiry is enforced both at read time and by the
//! periodic sweep walking the index front, which replaces the
//! one-timer-per-key scheme with bounded bookkeeping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use super::{BackendKind, CacheBackend, CacheStats};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    #[allow(dead_code)]
    ttl_secs: u64,
    expires_at_ms: i64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    // Sorted by expiry so the sweep only inspects the front.
    expiry_index: BTreeSet<(i64, String)>,
}

pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.entries.get(key)?.clone();
        if entry.expires_at_ms <= Self::now_ms() {
            inner.entries.remove(key);
            inner.expiry_index.remove(&(entry.expires_at_ms, key.to_string()));
            return None;
        }
        Some(entry.value)
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) {
        let now = Utc::now();
        let expires_at_ms = now.timestamp_millis() + (ttl_secs as i64) * 1000;
        let mut inner = self.inner.lock().unwrap();

        // Overwriting a key cancels its previous expiry entry, so the index
        // never holds two slots for one key.
        let stale = inner
            .entries
            .get(key)
            .map(|prev| (prev.expires_at_ms, key.to_string()));
        if let Some(stale) = stale {
            inner.expiry_index.remove(&stale);
        }

        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                ttl_secs,
                expires_at_ms,
            },
        );
        inner.expiry_index.insert((expires_at_ms, key.to_string()));
    }

    async fn delete(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.entries.remove(key) {
            inner.expiry_index.remove(&(entry.expires_at_ms, key.to_string()));
        }
    }

    async fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.expiry_index.clear();
    }

    async fn cleanup_expired(&self) -> usize {
        let now_ms = Self::now_ms();
        let mut inner = self.inner.lock().unwrap();

        let expired: Vec<(i64, String)> = inner
            .expiry_index
            .iter()
            .take_while(|(expires_at_ms, _)| *expires_at_ms <= now_ms)
            .cloned()
            .collect();

        for (expires_at_ms, key) in &expired {
            inner.expiry_index.remove(&(*expires_at_ms, key.clone()));
            inner.entries.remove(key);
        }
        expired.len()
    }

    async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        let approx_bytes: u64 = inner
            .entries
            .iter()
            .map(|(key, entry)| (key.len() + entry.value.len()) as u64)
            .sum();

        CacheStats {
            backend: BackendKind::Memory,
            total_items: inner.entries.len(),
            pending_expiries: inner.expiry_index.len(),
            approx_bytes,
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let cache = MemoryBackend::new();
        cache.set("key1", "value1".to_string(), 60).await;

        assert_eq!(cache.get("key1").await, Some("value1".to_string()));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let cache = MemoryBackend::new();
        cache.set("key", "value".to_string(), 1).await;
        assert_eq!(cache.get("key").await, Some("value".to_string()));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("key").await, None);
        assert_eq!(cache.stats().await.total_items, 0);
    }

    #[tokio::test]
    async fn overwrite_refreshes_expiry() {
        let cache = MemoryBackend::new();
        cache.set("key", "old".to_string(), 1).await;
        cache.set("key", "new".to_string(), 60).await;

        // Only one expiry slot for the key, the old one is cancelled.
        assert_eq!(cache.stats().await.pending_expiries, 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("key").await, Some("new".to_string()));
    }

    #[tokio::test]
    async fn sweep_removes_expired_entries() {
        let cache = MemoryBackend::new();
        cache.set("short", "a".to_string(), 1).await;
        cache.set("long", "b".to_string(), 60).await;

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let removed = cache.cleanup_expired().await;
        assert_eq!(removed, 1);

        let stats = cache.stats().await;
        assert_eq!(stats.total_items, 1);
        assert_eq!(stats.pending_expiries, 1);
    }

    #[tokio::test]
    async fn delete_and_clear_drop_bookkeeping() {
        let cache = MemoryBackend::new();
        cache.set("a", "1".to_string(), 60).await;
        cache.set("b", "2".to_string(), 60).await;

        cache.delete("a").await;
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.stats().await.pending_expiries, 1);

        cache.clear().await;
        let stats = cache.stats().await;
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.pending_expiries, 0);
    }
}
