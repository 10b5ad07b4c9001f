//! Merge destination and part staging configuration.

use serde::{Deserialize, Serialize};

/// Which backend receives merged objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Local filesystem, random-access concatenation.
    #[default]
    Local,
    /// Appender-file store, append-chain merge.
    Append,
}

/// Top-level merge destination configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend to merge into.
    #[serde(default)]
    pub backend: BackendKind,
    /// Local filesystem backend configuration.
    #[serde(default)]
    pub local: LocalBackendConfig,
    /// Append store backend configuration.
    #[serde(default)]
    pub append: AppendStoreConfig,
}

/// Local filesystem backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalBackendConfig {
    /// Root directory merged objects are written under.
    #[serde(default = "default_local_root")]
    pub root_path: String,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            root_path: default_local_root(),
        }
    }
}

/// Append store backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendStoreConfig {
    /// Root directory of the store's data.
    #[serde(default = "default_append_root")]
    pub root_path: String,
    /// Storage group new objects are placed in.
    #[serde(default = "default_group")]
    pub group: String,
}

impl Default for AppendStoreConfig {
    fn default() -> Self {
        Self {
            root_path: default_append_root(),
            group: default_group(),
        }
    }
}

/// Where parts wait until merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingKind {
    /// Staging directory on local disk.
    #[default]
    Local,
    /// Process memory; lost on restart.
    Memory,
}

/// Part staging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Staging implementation.
    #[serde(default)]
    pub kind: StagingKind,
    /// Root directory for staged parts (local staging only).
    #[serde(default = "default_staging_root")]
    pub root_path: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            kind: StagingKind::default(),
            root_path: default_staging_root(),
        }
    }
}

fn default_local_root() -> String {
    "./data/objects".to_string()
}

fn default_append_root() -> String {
    "./data/append".to_string()
}

fn default_group() -> String {
    "group1".to_string()
}

fn default_staging_root() -> String {
    "./data/parts".to_string()
}
