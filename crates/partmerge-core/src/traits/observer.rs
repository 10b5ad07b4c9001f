//! Merge progress hooks supplied by the caller at merge time.

use crate::error::AppError;
use crate::types::{CompleteMultipart, UploadId};

/// Receives merge lifecycle events.
///
/// All callbacks default to no-ops so implementations override only what
/// they need. Callbacks run inline on the merging task and must not block.
pub trait MergeObserver: Send + Sync {
    /// The merge acquired its lock and found `part_count` parts.
    fn on_merge_started(&self, upload_id: &UploadId, part_count: usize) {
        let _ = (upload_id, part_count);
    }

    /// A part was written to the destination.
    fn on_part_merged(&self, upload_id: &UploadId, part_number: u32, offset: u64, bytes: u64) {
        let _ = (upload_id, part_number, offset, bytes);
    }

    /// The merge finished and produced `result`.
    fn on_merge_completed(&self, upload_id: &UploadId, result: &CompleteMultipart) {
        let _ = (upload_id, result);
    }

    /// The merge stopped on a cancel request after `parts_merged` parts.
    fn on_merge_cancelled(&self, upload_id: &UploadId, parts_merged: usize) {
        let _ = (upload_id, parts_merged);
    }

    /// The merge failed.
    fn on_merge_failed(&self, upload_id: &UploadId, error: &AppError) {
        let _ = (upload_id, error);
    }
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl MergeObserver for NoopObserver {}
