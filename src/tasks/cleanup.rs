//! Expiry Cleanup Task
//!
//! Background task that periodically removes expired entries from every
//! cache tier.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TieredCache;

/// Spawns a background task that purges expired entries every
/// `cleanup_interval_secs` seconds.
///
/// Each tier is purged in batches of `batch_size` keys, taking the tier lock
/// once per batch so readers are never blocked for a full scan.
///
/// # Returns
/// A JoinHandle for the spawned task, aborted on shutdown or `dispose`.
///
/// # Example
/// ```ignore
/// let handle = spawn_cleanup_task(cache.clone(), 60, 100);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task(
    cache: Arc<TieredCache>,
    cleanup_interval_secs: u64,
    batch_size: usize,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiry cleanup task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired(batch_size.max(1)).await;

            if removed > 0 {
                info!("Expiry cleanup: removed {} expired entries", removed);
            } else {
                debug!("Expiry cleanup: no expired entries found");
            }
        }
    })
}
