//! Persistent SQLite cache backend
//!
//! Same contract as the in-memory backend, but entries survive restarts.
//! Expiry is checked lazily at read time (the expired row is purged then);
//! the periodic sweep handles bulk deletion. A round-trip failure degrades
//! to a cache miss, it never surfaces as an error.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use super::{BackendKind, CacheBackend, CacheStats};
use crate::errors::DashboardResult;
use crate::logger::{self, LogTag};

pub struct SqliteBackend {
    db: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open (or create) the cache database. Failure here means the backend
    /// is unreachable and the caller falls back to the in-memory cache.
    pub fn open(path: &str) -> DashboardResult<Self> {
        let db = Connection::open(path)?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                ttl INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache(expires_at)",
            [],
        )?;

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[async_trait]
impl CacheBackend for SqliteBackend {
    async fn get(&self, key: &str) -> Option<String> {
        let db = self.db.lock().unwrap();
        let result = db.query_row(
            "SELECT value, expires_at FROM cache WHERE key = ?1",
            params![key],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        );

        match result {
            Ok((value, expires_at)) if expires_at > Self::now_ms() => Some(value),
            Ok(_) => {
                // Expired row: purge lazily, report a miss.
                if let Err(e) = db.execute("DELETE FROM cache WHERE key = ?1", params![key]) {
                    logger::debug(LogTag::Cache, &format!("Failed to purge {}: {}", key, e));
                }
                None
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                logger::debug(LogTag::Cache, &format!("Cache get error for {}: {}", key, e));
                None
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) {
        let now_ms = Self::now_ms();
        let expires_at = now_ms + (ttl_secs as i64) * 1000;
        let db = self.db.lock().unwrap();

        if let Err(e) = db.execute(
            "INSERT OR REPLACE INTO cache (key, value, created_at, ttl, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![key, value, now_ms, ttl_secs as i64, expires_at],
        ) {
            logger::debug(LogTag::Cache, &format!("Cache set error for {}: {}", key, e));
        }
    }

    async fn delete(&self, key: &str) {
        let db = self.db.lock().unwrap();
        if let Err(e) = db.execute("DELETE FROM cache WHERE key = ?1", params![key]) {
            logger::debug(LogTag::Cache, &format!("Cache delete error for {}: {}", key, e));
        }
    }

    async fn clear(&self) {
        let db = self.db.lock().unwrap();
        if let Err(e) = db.execute("DELETE FROM cache", []) {
            logger::debug(LogTag::Cache, &format!("Cache clear error: {}", e));
        }
    }

    async fn cleanup_expired(&self) -> usize {
        let db = self.db.lock().unwrap();
        match db.execute(
            "DELETE FROM cache WHERE expires_at <= ?1",
            params![Self::now_ms()],
        ) {
            Ok(removed) => removed,
            Err(e) => {
                logger::debug(LogTag::Cache, &format!("Cache cleanup error: {}", e));
                0
            }
        }
    }

    async fn stats(&self) -> CacheStats {
        let db = self.db.lock().unwrap();
        let total_items: i64 = db
            .query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))
            .unwrap_or(0);
        let approx_bytes: i64 = db
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(key) + LENGTH(value)), 0) FROM cache",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        CacheStats {
            backend: BackendKind::Sqlite,
            total_items: total_items as usize,
            // Every persisted row awaits either lazy purge or the sweep.
            pending_expiries: total_items as usize,
            approx_bytes: approx_bytes as u64,
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn open_temp() -> (tempfile::TempDir, SqliteBackend) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let backend = SqliteBackend::open(path.to_str().unwrap()).unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (_dir, cache) = open_temp();
        cache.set("key1", "value1".to_string(), 60).await;

        assert_eq!(cache.get("key1").await, Some("value1".to_string()));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn expired_row_is_purged_on_read() {
        let (_dir, cache) = open_temp();
        cache.set("key", "value".to_string(), 1).await;

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("key").await, None);
        // The lazy purge removed the row, not just hid it.
        assert_eq!(cache.stats().await.total_items, 0);
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired_rows() {
        let (_dir, cache) = open_temp();
        cache.set("short", "a".to_string(), 1).await;
        cache.set("long", "b".to_string(), 60).await;

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.cleanup_expired().await, 1);
        assert_eq!(cache.stats().await.total_items, 1);
        assert_eq!(cache.get("long").await, Some("b".to_string()));
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_expiry() {
        let (_dir, cache) = open_temp();
        cache.set("key", "old".to_string(), 1).await;
        cache.set("key", "new".to_string(), 60).await;

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("key").await, Some("new".to_string()));
        assert_eq!(cache.stats().await.total_items, 1);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let (_dir, cache) = open_temp();
        cache.set("a", "1".to_string(), 60).await;
        cache.set("b", "2".to_string(), 60).await;

        cache.clear().await;
        assert_eq!(cache.stats().await.total_items, 0);
        assert_eq!(cache.get("a").await, None);
    }

    #[test]
    fn unreachable_database_fails_open() {
        assert!(SqliteBackend::open("/nonexistent-dir/nested/cache.db").is_err());
    }
}
