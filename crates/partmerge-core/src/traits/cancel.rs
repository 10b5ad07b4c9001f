//! Cooperative cancellation flags.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::UploadId;

/// Records cancel requests per upload session.
///
/// The merge engine polls [`CancellationRegistry::need_cancel`] between
/// parts; a request never interrupts a part that is mid-transfer.
#[async_trait]
pub trait CancellationRegistry: Send + Sync + std::fmt::Debug + 'static {
    /// Mark the session for cancellation.
    async fn request_cancel(&self, upload_id: &UploadId) -> AppResult<()>;

    /// Whether cancellation has been requested. Must not block.
    async fn need_cancel(&self, upload_id: &UploadId) -> AppResult<bool>;

    /// Forget any request for the session.
    async fn clear(&self, upload_id: &UploadId) -> AppResult<()>;
}
