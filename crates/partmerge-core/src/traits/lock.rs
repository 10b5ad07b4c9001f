//! Per-upload mutual exclusion.

use std::future::Future;

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::UploadId;

/// Proof of holding an upload's lock. The lock is released on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    _inner: Box<dyn Send + Sync>,
}

impl LockGuard {
    /// Wrap an implementation-specific guard.
    pub fn new(inner: impl Send + Sync + 'static) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}

/// Trait for session-keyed lock services.
///
/// At most one guard per upload id may be alive at a time. Guards for
/// distinct upload ids never contend.
#[async_trait]
pub trait LockManager: Send + Sync + std::fmt::Debug + 'static {
    /// Wait for and take the lock of `upload_id`.
    ///
    /// Failure to acquire (timeout, unreachable lock service) is returned
    /// as a lock error and is not retried.
    async fn acquire(&self, upload_id: &UploadId) -> AppResult<LockGuard>;
}

/// Run `f` while holding the lock of `upload_id`.
///
/// The lock is released when `f` finishes, fails, or the returned future
/// is dropped.
pub async fn with_lock<L, F, Fut, T>(locks: &L, upload_id: &UploadId, f: F) -> AppResult<T>
where
    L: LockManager + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let _guard = locks.acquire(upload_id).await?;
    f().await
}
