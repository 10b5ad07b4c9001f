//! In-memory cancellation registry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::info;

use partmerge_core::result::AppResult;
use partmerge_core::traits::CancellationRegistry;
use partmerge_core::types::UploadId;

/// Cancellation flags held in a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCancellationRegistry {
    /// Time of the first cancel request per upload.
    requested: Arc<DashMap<UploadId, DateTime<Utc>>>,
}

impl MemoryCancellationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// When cancellation was first requested for `upload_id`.
    pub fn requested_at(&self, upload_id: &UploadId) -> Option<DateTime<Utc>> {
        self.requested.get(upload_id).map(|t| *t)
    }

    /// Number of uploads with a pending cancel request.
    pub fn pending(&self) -> usize {
        self.requested.len()
    }
}

#[async_trait]
impl CancellationRegistry for MemoryCancellationRegistry {
    async fn request_cancel(&self, upload_id: &UploadId) -> AppResult<()> {
        self.requested.entry(*upload_id).or_insert_with(Utc::now);
        info!(upload_id = %upload_id, "Cancellation requested");
        Ok(())
    }

    async fn need_cancel(&self, upload_id: &UploadId) -> AppResult<bool> {
        Ok(self.requested.contains_key(upload_id))
    }

    async fn clear(&self, upload_id: &UploadId) -> AppResult<()> {
        self.requested.remove(upload_id);
        Ok(())
    }
}
