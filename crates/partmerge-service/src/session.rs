//! Upload session bookkeeping.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use partmerge_core::error::AppError;
use partmerge_core::result::AppResult;
use partmerge_core::traits::PartStore;
use partmerge_core::types::{PartInfo, UploadId, UploadPart, UploadSession, validate_object_name};

/// Tracks which uploads are in progress and fronts the part store.
#[derive(Debug)]
pub struct UploadSessionManager {
    sessions: DashMap<UploadId, UploadSession>,
    part_store: Arc<dyn PartStore>,
}

impl UploadSessionManager {
    pub fn new(part_store: Arc<dyn PartStore>) -> Self {
        Self {
            sessions: DashMap::new(),
            part_store,
        }
    }

    /// Part store backing this manager.
    pub fn part_store(&self) -> &Arc<dyn PartStore> {
        &self.part_store
    }

    /// Start a new upload for `object_name` and return its id.
    pub fn initiate(&self, object_name: &str) -> AppResult<UploadId> {
        validate_object_name(object_name)?;

        loop {
            let session = UploadSession::new(object_name);
            let upload_id = session.upload_id;
            if let Entry::Vacant(slot) = self.sessions.entry(upload_id) {
                slot.insert(session);
                info!(upload_id = %upload_id, object_name, "Initiated multipart upload");
                return Ok(upload_id);
            }
        }
    }

    /// Look up an active session.
    pub fn get(&self, upload_id: &UploadId) -> AppResult<UploadSession> {
        self.sessions
            .get(upload_id)
            .map(|s| s.clone())
            .ok_or_else(|| AppError::not_found(format!("Upload {upload_id} not found")))
    }

    /// Look up an active session and check it targets `object_name`.
    pub fn session_for(&self, upload_id: &UploadId, object_name: &str) -> AppResult<UploadSession> {
        let session = self.get(upload_id)?;
        if session.object_name != object_name {
            return Err(AppError::validation(format!(
                "Upload {upload_id} targets '{}', not '{object_name}'",
                session.object_name
            )));
        }
        Ok(session)
    }

    /// Stage a part for an active upload. Re-sending a part number replaces it.
    ///
    /// If the session ends while the part is streaming in, the stored bytes
    /// are dropped again and the call fails with `NotFound`.
    pub async fn put_part(&self, part: UploadPart) -> AppResult<PartInfo> {
        let upload_id = part.upload_id;
        self.get(&upload_id)?;
        let info = self.part_store.put_part(part).await?;

        if let Err(e) = self.get(&upload_id) {
            if let Err(cleanup) = self.part_store.delete_parts(&upload_id).await {
                warn!(upload_id = %upload_id, error = %cleanup, "Failed to drop late part");
            }
            return Err(e);
        }
        debug!(
            part_number = info.part_number,
            part_size = info.part_size,
            "Stored part"
        );
        Ok(info)
    }

    /// Parts received so far, ascending by part number.
    pub async fn list_parts(
        &self,
        upload_id: &UploadId,
        object_name: &str,
    ) -> AppResult<Vec<PartInfo>> {
        self.session_for(upload_id, object_name)?;
        let mut parts = self.part_store.list_parts(upload_id).await?;
        parts.sort_by_key(|p| p.part_number);
        Ok(parts)
    }

    /// Forget a session. Staged parts are left to the caller.
    pub fn remove(&self, upload_id: &UploadId) -> Option<UploadSession> {
        self.sessions.remove(upload_id).map(|(_, s)| s)
    }

    /// Snapshot of every active session, oldest first.
    pub fn active_sessions(&self) -> Vec<UploadSession> {
        let mut sessions: Vec<UploadSession> =
            self.sessions.iter().map(|s| s.value().clone()).collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    /// Ids of sessions older than `max_age`.
    pub fn expired(&self, max_age: chrono::Duration) -> Vec<UploadId> {
        let now = Utc::now();
        self.sessions
            .iter()
            .filter(|s| s.is_expired(max_age, now))
            .map(|s| *s.key())
            .collect()
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
