//! In-memory per-upload lock manager using Tokio mutexes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use partmerge_core::error::AppError;
use partmerge_core::result::AppResult;
use partmerge_core::traits::{LockGuard, LockManager};
use partmerge_core::types::UploadId;

type LockTable = DashMap<UploadId, Arc<Mutex<()>>>;

/// Lock manager keeping one async mutex per upload id.
///
/// Suitable for single-node deployments only. Table entries are dropped
/// as soon as nobody holds or waits for them.
#[derive(Debug, Clone)]
pub struct MemoryLockManager {
    /// Live locks keyed by upload id.
    locks: Arc<LockTable>,
    /// How long `acquire` waits before giving up.
    timeout: Duration,
}

impl MemoryLockManager {
    /// Create a lock manager whose acquisitions wait at most `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Whether the lock for `upload_id` is currently held.
    pub fn is_locked(&self, upload_id: &UploadId) -> bool {
        self.locks
            .get(upload_id)
            .map(|m| m.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of upload ids with a holder or waiter.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

impl Default for MemoryLockManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Remove the table entry once only the table references the mutex.
fn prune(locks: &LockTable, upload_id: &UploadId) {
    locks.remove_if(upload_id, |_, m| Arc::strong_count(m) == 1);
}

#[async_trait]
impl LockManager for MemoryLockManager {
    async fn acquire(&self, upload_id: &UploadId) -> AppResult<LockGuard> {
        let mutex = self
            .locks
            .entry(*upload_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                debug!(upload_id = %upload_id, "Acquired upload lock");
                Ok(LockGuard::new(HeldLock {
                    guard: Some(guard),
                    locks: self.locks.clone(),
                    upload_id: *upload_id,
                }))
            }
            Err(_) => {
                prune(&self.locks, upload_id);
                warn!(
                    upload_id = %upload_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Timed out waiting for upload lock"
                );
                Err(AppError::lock(format!(
                    "Timed out after {:?} waiting for lock on upload {upload_id}",
                    self.timeout
                )))
            }
        }
    }
}

/// Held mutex plus what is needed to prune the table on release.
struct HeldLock {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockTable>,
    upload_id: UploadId,
}

impl Drop for HeldLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        prune(&self.locks, &self.upload_id);
        debug!(upload_id = %self.upload_id, "Released upload lock");
    }
}
