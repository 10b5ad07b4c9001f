//! Merge results and destination handles.

use serde::{Deserialize, Serialize};

/// Result of a successful merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteMultipart {
    /// Name the backend reports for the stored object.
    pub object_name: String,
    /// Full path or address of the stored object on the backend.
    pub full_path: String,
}

/// How a merge ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The object was reconstructed.
    Completed(CompleteMultipart),
    /// Cancellation was requested; nothing was left on the backend.
    Cancelled,
}

impl MergeOutcome {
    /// The completion result, if the merge completed.
    pub fn completed(self) -> Option<CompleteMultipart> {
        match self {
            Self::Completed(c) => Some(c),
            Self::Cancelled => None,
        }
    }

    /// Whether the merge was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Identifies an object under construction on a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationHandle {
    /// Backend-reported object name.
    pub name: String,
    /// Backend-specific location (file path, store path, URL).
    pub path: String,
}
