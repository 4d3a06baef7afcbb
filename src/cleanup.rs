//! Scheduled purge of expired revocation entries.
//!
//! Revocation checks already ignore expired entries, so this only keeps the
//! store from growing.

use crate::revocation::RevocationStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(store: &dyn RevocationStore) {
    match store.purge_expired().await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired revocation entries", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up revocation entries: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(store: Arc<dyn RevocationStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(store.as_ref()).await;
        }
    })
}
