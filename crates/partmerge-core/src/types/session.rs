//! Upload session records and object name rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

use super::id::UploadId;

/// One in-progress multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    /// Session identifier.
    pub upload_id: UploadId,
    /// Name of the object being assembled.
    pub object_name: String,
    /// When the session was initiated.
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    /// Create a session for `object_name` with a fresh identifier.
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            upload_id: UploadId::new(),
            object_name: object_name.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether the session is older than `max_age` at `now`.
    pub fn is_expired(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > max_age
    }
}

/// Check that an object name is a relative, slash-separated path with no
/// empty, `.` or `..` segments.
pub fn validate_object_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::validation("Object name must not be empty"));
    }
    if name.contains('\0') {
        return Err(AppError::validation("Object name must not contain NUL"));
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(AppError::validation(format!(
            "Object name must be relative: {name}"
        )));
    }
    for segment in name.split(['/', '\\']) {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(AppError::validation(format!(
                "Malformed object name: {name}"
            )));
        }
    }
    Ok(())
}

/// Extension of the object's final path segment, without the dot.
///
/// Returns an empty string when there is none.
pub fn object_extension(name: &str) -> &str {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file_name.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &file_name[idx + 1..],
    }
}
