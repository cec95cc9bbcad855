//! SQLite-backed context cache.
//!
//! Implements `ContextCache` from kfbridge-core. Expiry is stored as unix
//! epoch milliseconds; expired rows are invisible to reads and purged when
//! keys are listed.

use std::time::Duration;

use chrono::Utc;
use sqlx::Row;

use kfbridge_core::cache::ContextCache;
use kfbridge_types::error::CacheError;

use super::pool::DatabasePool;

pub struct SqliteContextCache {
    pool: DatabasePool,
}

impl SqliteContextCache {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Open (and migrate) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, CacheError> {
        let pool = DatabasePool::new(database_url)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self::new(pool))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry_ms(ttl: Duration) -> i64 {
    now_ms().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

fn query_error(e: sqlx::Error) -> CacheError {
    CacheError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// ContextCache implementation
// ---------------------------------------------------------------------------

impl ContextCache for SqliteContextCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let row = sqlx::query("SELECT value FROM context_cache WHERE key = ? AND expires_at > ?")
            .bind(key)
            .bind(now_ms())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.map(|row| row.try_get::<String, _>("value").map_err(query_error))
            .transpose()
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        sqlx::query(
            "INSERT INTO context_cache (key, value, expires_at, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
             expires_at = excluded.expires_at, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(expiry_ms(ttl))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let result = sqlx::query(
            "UPDATE context_cache SET expires_at = ?, updated_at = ? WHERE key = ? AND expires_at > ?",
        )
        .bind(expiry_ms(ttl))
        .bind(Utc::now().to_rfc3339())
        .bind(key)
        .bind(now_ms())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn del(&self, key: &str) -> Result<bool, CacheError> {
        let row = sqlx::query("DELETE FROM context_cache WHERE key = ? RETURNING expires_at")
            .bind(key)
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(row.is_some_and(|row| row.get::<i64, _>("expires_at") > now_ms()))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let purged = sqlx::query("DELETE FROM context_cache WHERE expires_at <= ?")
            .bind(now_ms())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?
            .rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "purged expired context rows");
        }

        let rows = sqlx::query(
            "SELECT key FROM context_cache WHERE substr(key, 1, length(?1)) = ?1 AND expires_at > ?2 ORDER BY key",
        )
        .bind(prefix)
        .bind(now_ms())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("key").map_err(query_error))
            .collect()
    }

    async fn ping(&self) -> Result<(), CacheError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool.reader)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.pool.close().await;
        tracing::info!("sqlite context cache closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn cache() -> (SqliteContextCache, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("cache.db").display());
        (SqliteContextCache::connect(&url).await.unwrap(), dir)
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let (cache, _dir) = cache().await;
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set_ex("k", "v1", HOUR).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v1"));

        cache.set_ex("k", "v2", HOUR).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_expired_rows_are_invisible() {
        let (cache, _dir) = cache().await;
        cache.set_ex("gone", "v", Duration::ZERO).await.unwrap();

        assert_eq!(cache.get("gone").await.unwrap(), None);
        assert!(!cache.expire("gone", HOUR).await.unwrap());
        assert!(cache.keys("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_del_reports_only_live_rows() {
        let (cache, _dir) = cache().await;
        cache.set_ex("gone", "v", Duration::ZERO).await.unwrap();
        assert!(!cache.del("gone").await.unwrap());

        cache.set_ex("live", "v", HOUR).await.unwrap();
        assert!(cache.del("live").await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_extends_live_key() {
        let (cache, _dir) = cache().await;
        cache.set_ex("k", "v", HOUR).await.unwrap();
        assert!(cache.expire("k", HOUR * 2).await.unwrap());
        assert!(!cache.expire("missing", HOUR).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_by_prefix_and_delete() {
        let (cache, _dir) = cache().await;
        cache.set_ex("wechat:context:a", "1", HOUR).await.unwrap();
        cache.set_ex("wechat:context:b", "2", HOUR).await.unwrap();
        cache.set_ex("other:context:c", "3", HOUR).await.unwrap();
        cache.set_ex("wechat%context:d", "4", HOUR).await.unwrap();

        assert_eq!(
            cache.keys("wechat:context:").await.unwrap(),
            vec!["wechat:context:a", "wechat:context:b"]
        );

        assert!(cache.del("wechat:context:a").await.unwrap());
        assert!(!cache.del("wechat:context:a").await.unwrap());
        assert_eq!(cache.keys("wechat:").await.unwrap(), vec!["wechat:context:b"]);
    }

    #[tokio::test]
    async fn test_ping_and_close() {
        let (cache, _dir) = cache().await;
        cache.ping().await.unwrap();
        cache.close().await.unwrap();
        assert!(cache.ping().await.is_err());
    }
}
