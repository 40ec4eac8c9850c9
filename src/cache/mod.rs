//! TTL cache in front of the query API
//!
//! Generic key/value cache, polymorphic over the backend. The persistent
//! SQLite backend is chosen once at construction when its database opens;
//! otherwise the process falls back permanently to the in-memory backend.
//! There is no runtime re-probing or reattachment.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::CacheSettings;
use crate::logger::{self, LogTag};
use memory::MemoryBackend;
use sqlite::SqliteBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Sqlite,
    Memory,
}

/// Read-only diagnostic snapshot of a backend.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub backend: BackendKind,
    pub total_items: usize,
    pub pending_expiries: usize,
    pub approx_bytes: u64,
}

/// Capability set every backend implements. Values are opaque JSON strings;
/// (de)serialization lives in the service wrapper.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String, ttl_secs: u64);
    async fn delete(&self, key: &str);
    async fn clear(&self);
    /// Remove entries whose TTL has elapsed, returning how many were dropped.
    async fn cleanup_expired(&self) -> usize;
    async fn stats(&self) -> CacheStats;
    fn kind(&self) -> BackendKind;
}

pub struct CacheService {
    backend: Box<dyn CacheBackend>,
    default_ttl_secs: u64,
}

impl CacheService {
    /// Choose a backend once: SQLite when enabled and reachable, otherwise
    /// the in-memory cache (logged once, never retried).
    pub fn new(settings: &CacheSettings) -> Self {
        let backend: Box<dyn CacheBackend> = if settings.persistent {
            match SqliteBackend::open(&settings.database_path) {
                Ok(backend) => {
                    logger::info(
                        LogTag::Cache,
                        &format!("Using SQLite cache backend ({})", settings.database_path),
                    );
                    Box::new(backend)
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Cache,
                        &format!("SQLite cache unavailable ({}), using in-memory cache", e),
                    );
                    Box::new(MemoryBackend::new())
                }
            }
        } else {
            logger::info(LogTag::Cache, "Using in-memory cache backend");
            Box::new(MemoryBackend::new())
        };

        Self {
            backend,
            default_ttl_secs: settings.default_ttl_secs,
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.backend.get(key).await
    }

    /// Store a value with the given TTL, or the configured default when
    /// `ttl_secs` is `None`. Overwriting a key replaces its expiry.
    pub async fn set(&self, key: &str, value: String, ttl_secs: Option<u64>) {
        let ttl = ttl_secs.unwrap_or(self.default_ttl_secs);
        self.backend.set(key, value, ttl).await;
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.backend.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                logger::debug(
                    LogTag::Cache,
                    &format!("Dropping undecodable cache entry {}: {}", key, e),
                );
                self.backend.delete(key).await;
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: Option<u64>) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, raw, ttl_secs).await,
            Err(e) => {
                logger::warning(
                    LogTag::Cache,
                    &format!("Failed to serialize cache value for {}: {}", key, e),
                );
            }
        }
    }

    /// Store a response envelope, but only when it reports success. Failure
    /// envelopes are never cached: an error recorded while the data was
    /// missing must not keep answering for a full TTL once the data exists.
    pub async fn set_envelope(
        &self,
        key: &str,
        envelope: &serde_json::Value,
        ttl_secs: Option<u64>,
    ) {
        if envelope.get("success").and_then(serde_json::Value::as_bool) == Some(true) {
            self.set_json(key, envelope, ttl_secs).await;
        }
    }

    pub async fn delete(&self, key: &str) {
        self.backend.delete(key).await;
    }

    pub async fn clear(&self) {
        self.backend.clear().await;
    }

    pub async fn cleanup_expired(&self) -> usize {
        self.backend.cleanup_expired().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.backend.stats().await
    }

    /// Deterministic cache key from request parameters, whitespace collapsed
    /// to underscores (e.g. `["performance", state, district]`).
    pub fn cache_key(parts: &[&str]) -> String {
        parts
            .iter()
            .map(|part| part.split_whitespace().collect::<Vec<_>>().join("_"))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Periodic sweep over the backend's expiry bookkeeping. One task per
    /// service instance; expired keys are also rejected at read time, so the
    /// sweep only bounds memory, it is not load-bearing for correctness.
    pub fn start_sweeper(service: Arc<Self>, interval_secs: u64) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            interval.tick().await; // first tick resolves immediately
            loop {
                interval.tick().await;
                let removed = service.cleanup_expired().await;
                if removed > 0 {
                    logger::debug(
                        LogTag::Cache,
                        &format!("Expiry sweep removed {} entries", removed),
                    );
                }
            }
        })
    }
}
