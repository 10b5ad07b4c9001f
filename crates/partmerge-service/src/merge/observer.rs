//! Merge observer that reports progress through `tracing`.

use tracing::{debug, info, warn};

use partmerge_core::error::AppError;
use partmerge_core::traits::MergeObserver;
use partmerge_core::types::{CompleteMultipart, UploadId};

/// Logs every merge event with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl MergeObserver for TracingObserver {
    fn on_merge_started(&self, upload_id: &UploadId, part_count: usize) {
        info!(upload_id = %upload_id, part_count, "Merge started");
    }

    fn on_part_merged(&self, upload_id: &UploadId, part_number: u32, offset: u64, bytes: u64) {
        debug!(upload_id = %upload_id, part_number, offset, bytes, "Part merged");
    }

    fn on_merge_completed(&self, upload_id: &UploadId, result: &CompleteMultipart) {
        info!(
            upload_id = %upload_id,
            object_name = %result.object_name,
            full_path = %result.full_path,
            "Merge completed"
        );
    }

    fn on_merge_cancelled(&self, upload_id: &UploadId, parts_merged: usize) {
        info!(upload_id = %upload_id, parts_merged, "Merge cancelled");
    }

    fn on_merge_failed(&self, upload_id: &UploadId, error: &AppError) {
        warn!(upload_id = %upload_id, error = %error, "Merge failed");
    }
}
