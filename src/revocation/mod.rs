//! Token revocation (blacklist) with self-expiring entries.
//!
//! A token value present in the store must never authenticate again, even if
//! its signature and expiry are otherwise valid. Entries are stored only for
//! the remaining lifetime of the token they deny, so the store never holds
//! more than the tokens revoked before their natural expiry.
//!
//! Stores are reached through [`RevocationGuard`], which bounds every call
//! with a timeout and applies the configured [`ReadPolicy`] when the store
//! cannot answer.

mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub use memory::MemoryRevocationStore;

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("revocation store unavailable: {0}")]
    Unavailable(String),
    #[error("revocation store did not answer within {0:?}")]
    Timeout(Duration),
}

/// Shared denial-list keyed by raw token value.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Deny `token` for `remaining`. A zero duration is a no-op.
    ///
    /// Revoking an already revoked token succeeds and never shortens the
    /// existing entry.
    async fn revoke(&self, token: &str, remaining: Duration) -> Result<(), StoreError>;

    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError>;

    /// Drop entries whose token has expired. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}

/// What to answer when the store cannot be consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// Treat the token as not revoked and log a warning.
    #[default]
    FailOpen,
    /// Treat the token as revoked.
    FailClosed,
}

/// Raw answer from the store, before the read policy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStatus {
    Active,
    Revoked,
    Unavailable,
}

/// Timeout- and policy-aware front for a [`RevocationStore`].
#[derive(Clone)]
pub struct RevocationGuard {
    store: Arc<dyn RevocationStore>,
    timeout: Duration,
    read_policy: ReadPolicy,
}

impl RevocationGuard {
    pub fn new(store: Arc<dyn RevocationStore>, timeout: Duration, read_policy: ReadPolicy) -> Self {
        Self {
            store,
            timeout,
            read_policy,
        }
    }

    /// Ask the store about `token`, bounded by the configured timeout.
    pub async fn status(&self, token: &str) -> RevocationStatus {
        let result = match tokio::time::timeout(self.timeout, self.store.is_revoked(token)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        };

        match result {
            Ok(true) => RevocationStatus::Revoked,
            Ok(false) => RevocationStatus::Active,
            Err(e) => {
                warn!(error = %e, policy = ?self.read_policy, "Revocation check could not be answered");
                RevocationStatus::Unavailable
            }
        }
    }

    /// Whether `token` must be denied, after applying the read policy.
    pub async fn is_revoked(&self, token: &str) -> bool {
        match self.status(token).await {
            RevocationStatus::Active => false,
            RevocationStatus::Revoked => true,
            RevocationStatus::Unavailable => self.read_policy == ReadPolicy::FailClosed,
        }
    }

    /// Revoke `token` for `remaining`, bounded by the configured timeout.
    pub async fn revoke(&self, token: &str, remaining: Duration) -> Result<(), StoreError> {
        if remaining.is_zero() {
            return Ok(());
        }

        tokio::time::timeout(self.timeout, self.store.revoke(token, remaining))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{FailingStore, HangingStore};
    use super::*;

    fn make_guard(store: Arc<dyn RevocationStore>, policy: ReadPolicy) -> RevocationGuard {
        RevocationGuard::new(store, Duration::from_millis(50), policy)
    }

    #[tokio::test]
    async fn test_guard_reports_store_answers() {
        let store = Arc::new(MemoryRevocationStore::new());
        let guard = make_guard(store.clone(), ReadPolicy::FailOpen);

        assert_eq!(guard.status("tok").await, RevocationStatus::Active);
        guard.revoke("tok", Duration::from_secs(5)).await.unwrap();
        assert_eq!(guard.status("tok").await, RevocationStatus::Revoked);
        assert!(guard.is_revoked("tok").await);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_open() {
        let guard = make_guard(Arc::new(FailingStore), ReadPolicy::FailOpen);

        assert_eq!(guard.status("tok").await, RevocationStatus::Unavailable);
        assert!(!guard.is_revoked("tok").await);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_closed_when_configured() {
        let guard = make_guard(Arc::new(FailingStore), ReadPolicy::FailClosed);

        assert!(guard.is_revoked("tok").await);
    }

    #[tokio::test]
    async fn test_hanging_store_times_out_and_fails_open() {
        let guard = make_guard(Arc::new(HangingStore), ReadPolicy::FailOpen);

        let started = std::time::Instant::now();
        assert!(!guard.is_revoked("tok").await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_revoke_errors_propagate() {
        let guard = make_guard(Arc::new(FailingStore), ReadPolicy::FailOpen);

        assert!(matches!(
            guard.revoke("tok", Duration::from_secs(5)).await,
            Err(StoreError::Unavailable(_))
        ));

        let guard = make_guard(Arc::new(HangingStore), ReadPolicy::FailOpen);
        assert!(matches!(
            guard.revoke("tok", Duration::from_secs(5)).await,
            Err(StoreError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_ttl_revoke_skips_store() {
        // Would fail if the store were called
        let guard = make_guard(Arc::new(FailingStore), ReadPolicy::FailOpen);

        assert!(guard.revoke("tok", Duration::ZERO).await.is_ok());
    }
}
