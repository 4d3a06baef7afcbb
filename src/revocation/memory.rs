//! In-process revocation store.
//!
//! Suitable for a single instance. Entries carry their own deadline and are
//! dropped lazily on read or by [`RevocationStore::purge_expired`].

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use super::{RevocationStore, StoreError};

#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: DashMap<String, Instant>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, including ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, token: &str, remaining: Duration) -> Result<(), StoreError> {
        if remaining.is_zero() {
            return Ok(());
        }

        let deadline = Instant::now() + remaining;
        self.entries
            .entry(token.to_string())
            .and_modify(|existing| {
                if deadline > *existing {
                    *existing = deadline;
                }
            })
            .or_insert(deadline);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let expired = match self.entries.get(token) {
            None => return Ok(false),
            Some(deadline) => *deadline <= now,
        };

        if expired {
            self.entries.remove_if(token, |_, deadline| *deadline <= now);
            return Ok(false);
        }
        Ok(true)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut purged = 0;
        self.entries.retain(|_, deadline| {
            let keep = *deadline > now;
            if !keep {
                purged += 1;
            }
            keep
        });
        Ok(purged)
    }
}
