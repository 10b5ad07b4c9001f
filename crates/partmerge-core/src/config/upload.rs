//! Upload session and merge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upload session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Age after which an unfinished session may be purged (default 24 h).
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
    /// How long a merge waits for the per-upload lock.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_seconds: u64,
}

impl UploadConfig {
    /// Session time-to-live.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    /// Lock acquisition timeout.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_seconds)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: default_session_ttl(),
            lock_timeout_seconds: default_lock_timeout(),
        }
    }
}

fn default_session_ttl() -> u64 {
    86_400
}

fn default_lock_timeout() -> u64 {
    30
}
