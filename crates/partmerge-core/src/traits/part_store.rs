//! Part store trait for staging uploaded parts until merge.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{PartInfo, UploadId, UploadPart};

/// Persists raw part content keyed by `(upload_id, part_number)`.
///
/// Implementations must tolerate concurrent `put_part` calls for distinct
/// part numbers of one session. Concurrent puts of the same part number
/// are last-write-wins.
#[async_trait]
pub trait PartStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the store type name (e.g., "local", "memory").
    fn store_type(&self) -> &str;

    /// Store a part, replacing any earlier part with the same number.
    ///
    /// The content is consumed as a stream. If the number of bytes read
    /// differs from `part.part_size` the part is discarded and a
    /// validation error is returned.
    async fn put_part(&self, part: UploadPart) -> AppResult<PartInfo>;

    /// List stored parts without opening their content.
    async fn list_parts(&self, upload_id: &UploadId) -> AppResult<Vec<PartInfo>>;

    /// Open every stored part of a session for reading.
    ///
    /// The order is deterministic for a given stored set but callers
    /// must not rely on it being ascending.
    async fn list_upload_parts(
        &self,
        upload_id: &UploadId,
        object_name: &str,
    ) -> AppResult<Vec<UploadPart>>;

    /// Release every resource held for a session.
    ///
    /// Succeeds when the session has no parts.
    async fn delete_parts(&self, upload_id: &UploadId) -> AppResult<()>;
}
