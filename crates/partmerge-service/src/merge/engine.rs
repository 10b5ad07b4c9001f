//! Merge orchestration: locking, dispatch, cleanup.

use std::sync::Arc;

use tracing::{info, warn};

use partmerge_core::config::AppConfig;
use partmerge_core::error::{AppError, ErrorKind};
use partmerge_core::result::AppResult;
use partmerge_core::traits::{
    BackendCapability, CancellationRegistry, LockManager, MergeObserver, StorageBackend, with_lock,
};
use partmerge_core::types::{DestinationHandle, MergeOutcome, UploadId, UploadSession, sort_parts};
use partmerge_storage::{build_backend, build_part_store};

use crate::cancel::MemoryCancellationRegistry;
use crate::lock::MemoryLockManager;
use crate::session::UploadSessionManager;

use super::observer::TracingObserver;
use super::strategy::{self, MergeContext, MergeProgress, StrategyEnd};

/// Assembles staged parts into final objects.
///
/// Every merge, abort and purge for an upload runs under that upload's
/// lock. Parts and session state are released only after a merge completes
/// or is cancelled; a failed merge leaves them in place for a retry.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    sessions: Arc<UploadSessionManager>,
    locks: Arc<dyn LockManager>,
    cancellations: Arc<dyn CancellationRegistry>,
    backend: Arc<dyn StorageBackend>,
    /// Age after which `purge_stale` aborts a session.
    session_ttl: chrono::Duration,
}

impl MergeEngine {
    pub fn new(
        sessions: Arc<UploadSessionManager>,
        locks: Arc<dyn LockManager>,
        cancellations: Arc<dyn CancellationRegistry>,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            sessions,
            locks,
            cancellations,
            backend,
            session_ttl: chrono::Duration::hours(24),
        }
    }

    /// Override the session age used by `purge_stale`.
    pub fn with_session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Wire an engine from configuration using the in-memory lock manager
    /// and cancellation registry.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let part_store = build_part_store(&config.staging).await?;
        let backend = build_backend(&config.storage).await?;

        let session_ttl = chrono::Duration::from_std(config.upload.session_ttl()).map_err(|e| {
            AppError::configuration(format!("Invalid upload.session_ttl_seconds: {e}"))
        })?;

        Ok(Self::new(
            Arc::new(UploadSessionManager::new(part_store)),
            Arc::new(MemoryLockManager::new(config.upload.lock_timeout())),
            Arc::new(MemoryCancellationRegistry::new()),
            backend,
        )
        .with_session_ttl(session_ttl))
    }

    pub fn sessions(&self) -> &Arc<UploadSessionManager> {
        &self.sessions
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Merge with the default logging observer.
    pub async fn complete(&self, upload_id: &UploadId, object_name: &str) -> AppResult<MergeOutcome> {
        self.merge(upload_id, object_name, &TracingObserver).await
    }

    /// Merge every staged part of `upload_id` into `object_name`.
    ///
    /// Returns `Cancelled` when a cancel request is seen before any part or
    /// between parts. Any partially written destination is removed in that
    /// case and on error.
    pub async fn merge(
        &self,
        upload_id: &UploadId,
        object_name: &str,
        observer: &dyn MergeObserver,
    ) -> AppResult<MergeOutcome> {
        let result = with_lock(self.locks.as_ref(), upload_id, || {
            self.merge_locked(upload_id, object_name, observer)
        })
        .await;

        if let Err(e) = &result {
            observer.on_merge_failed(upload_id, e);
        }
        result
    }

    /// Ask any running or future merge of `upload_id` to stop.
    ///
    /// Fails with `NotFound` unless the upload is still active.
    pub async fn cancel(&self, upload_id: &UploadId) -> AppResult<()> {
        self.sessions.get(upload_id)?;
        self.cancellations.request_cancel(upload_id).await?;

        // A merge may have ended the session between the check and the flag.
        if self.sessions.get(upload_id).is_err() {
            self.clear_cancel(upload_id).await;
        }
        Ok(())
    }

    /// Cancel `upload_id` and discard its staged parts and session.
    pub async fn abort(&self, upload_id: &UploadId) -> AppResult<()> {
        self.sessions.get(upload_id)?;
        self.cancellations.request_cancel(upload_id).await?;

        with_lock(self.locks.as_ref(), upload_id, || async {
            if self.sessions.get(upload_id).is_ok() {
                self.end_session(upload_id).await;
                info!(upload_id = %upload_id, "Aborted multipart upload");
            } else {
                self.clear_cancel(upload_id).await;
            }
            Ok(())
        })
        .await
    }

    /// Abort every session older than `max_age`. Returns how many were removed.
    pub async fn purge_expired(&self, max_age: chrono::Duration) -> AppResult<usize> {
        let expired = self.sessions.expired(max_age);
        let mut purged = 0;

        for upload_id in expired {
            match self.abort(&upload_id).await {
                Ok(()) => purged += 1,
                Err(e) if e.is(ErrorKind::NotFound) => {}
                Err(e) => {
                    warn!(upload_id = %upload_id, error = %e, "Failed to purge expired upload");
                }
            }
        }

        if purged > 0 {
            info!(purged, "Purged expired uploads");
        }
        Ok(purged)
    }

    /// Abort sessions older than the configured session TTL.
    pub async fn purge_stale(&self) -> AppResult<usize> {
        self.purge_expired(self.session_ttl).await
    }

    async fn merge_locked(
        &self,
        upload_id: &UploadId,
        object_name: &str,
        observer: &dyn MergeObserver,
    ) -> AppResult<MergeOutcome> {
        let session = self.sessions.session_for(upload_id, object_name)?;

        if self.cancellations.need_cancel(upload_id).await? {
            self.end_session(upload_id).await;
            observer.on_merge_cancelled(upload_id, 0);
            return Ok(MergeOutcome::Cancelled);
        }

        let mut parts = self
            .sessions
            .part_store()
            .list_upload_parts(upload_id, &session.object_name)
            .await?;
        if parts.is_empty() {
            return Err(AppError::no_parts(format!(
                "Upload {upload_id} has no parts to merge"
            )));
        }
        sort_parts(&mut parts);
        observer.on_merge_started(upload_id, parts.len());

        let ctx = MergeContext {
            session: &session,
            backend: self.backend.as_ref(),
            cancellations: self.cancellations.as_ref(),
            observer,
        };
        let mut progress = MergeProgress::default();

        let end = match self.backend.capability() {
            BackendCapability::RandomAccess => {
                strategy::concatenate(&ctx, parts, &mut progress).await
            }
            BackendCapability::AppendOnly => {
                strategy::append_chain(&ctx, parts, &mut progress).await
            }
        };

        match end {
            Ok(StrategyEnd::Finished) => self.finish(&session, progress, observer).await,
            Ok(StrategyEnd::Cancelled) => {
                self.discard(progress.destination.take()).await;
                self.end_session(upload_id).await;
                observer.on_merge_cancelled(upload_id, progress.parts_merged);
                Ok(MergeOutcome::Cancelled)
            }
            Err(e) => {
                self.discard(progress.destination.take()).await;
                Err(e)
            }
        }
    }

    async fn finish(
        &self,
        session: &UploadSession,
        progress: MergeProgress,
        observer: &dyn MergeObserver,
    ) -> AppResult<MergeOutcome> {
        let handle = progress
            .destination
            .ok_or_else(|| AppError::internal("Merge finished without a destination"))?;
        let result = self.backend.report_final_path(&handle);

        self.end_session(&session.upload_id).await;
        observer.on_merge_completed(&session.upload_id, &result);
        Ok(MergeOutcome::Completed(result))
    }

    /// Best-effort removal of a partially written destination.
    async fn discard(&self, destination: Option<DestinationHandle>) {
        let Some(handle) = destination else {
            return;
        };
        if let Err(e) = self.backend.delete_destination(&handle).await {
            warn!(
                destination = %handle.path,
                error = %e,
                "Failed to remove partial destination"
            );
        }
    }

    /// Drop staged parts, the cancel flag and the session record.
    async fn end_session(&self, upload_id: &UploadId) {
        if let Err(e) = self.sessions.part_store().delete_parts(upload_id).await {
            warn!(upload_id = %upload_id, error = %e, "Failed to delete staged parts");
        }
        self.clear_cancel(upload_id).await;
        self.sessions.remove(upload_id);
    }

    async fn clear_cancel(&self, upload_id: &UploadId) {
        if let Err(e) = self.cancellations.clear(upload_id).await {
            warn!(upload_id = %upload_id, error = %e, "Failed to clear cancel flag");
        }
    }
}
