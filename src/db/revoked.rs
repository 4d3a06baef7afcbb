//! SQLite-backed revocation store.
//!
//! Lets several processes sharing one database file see each other's
//! revocations. Rows carry the deadline (Unix milliseconds) after which the
//! revoked token would have expired anyway.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::revocation::{RevocationStore, StoreError};

#[derive(Clone)]
pub struct SqliteRevocationStore {
    pool: SqlitePool,
}

impl SqliteRevocationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of rows, including ones not yet purged.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM revoked_tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl RevocationStore for SqliteRevocationStore {
    async fn revoke(&self, token: &str, remaining: Duration) -> Result<(), StoreError> {
        if remaining.is_zero() {
            return Ok(());
        }

        let expires_at = now_millis() + remaining.as_millis() as i64;
        sqlx::query(
            "INSERT INTO revoked_tokens (token, expires_at) VALUES (?, ?)
             ON CONFLICT(token) DO UPDATE SET expires_at = MAX(expires_at, excluded.expires_at)",
        )
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError> {
        let (revoked,): (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE token = ? AND expires_at > ?)",
        )
        .bind(token)
        .bind(now_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(revoked != 0)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_revoke_then_read() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.revocations();

        assert!(!store.is_revoked("tok").await.unwrap());
        store.revoke("tok", Duration::from_secs(5)).await.unwrap();
        assert!(store.is_revoked("tok").await.unwrap());
        assert!(!store.is_revoked("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_twice_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.revocations();

        store.revoke("tok", Duration::from_secs(5)).await.unwrap();
        store.revoke("tok", Duration::from_secs(5)).await.unwrap();

        assert!(store.is_revoked("tok").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_noop() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.revocations();

        store.revoke("tok", Duration::ZERO).await.unwrap();

        assert!(!store.is_revoked("tok").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_entry_ignored_and_purged() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.revocations();

        store.revoke("short", Duration::from_millis(20)).await.unwrap();
        store.revoke("long", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!store.is_revoked("short").await.unwrap());
        assert!(store.is_revoked("long").await.unwrap());

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_shorter_ttl_does_not_shrink_entry() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.revocations();

        store.revoke("tok", Duration::from_secs(60)).await.unwrap();
        store.revoke("tok", Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.is_revoked("tok").await.unwrap());
    }
}
