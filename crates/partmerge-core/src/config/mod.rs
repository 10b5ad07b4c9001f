//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field has a default so an empty file is valid.

pub mod logging;
pub mod storage;
pub mod upload;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::storage::{
    AppendStoreConfig, BackendKind, LocalBackendConfig, StagingConfig, StagingKind, StorageConfig,
};
pub use self::upload::UploadConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Merge destination settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Part staging settings.
    #[serde(default)]
    pub staging: StagingConfig,
    /// Upload session and merge settings.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `PARTMERGE__`.
    pub fn load(config_dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{config_dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{config_dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PARTMERGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
