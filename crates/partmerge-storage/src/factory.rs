//! Builds part stores and backends from configuration.

use std::sync::Arc;

use tracing::info;

use partmerge_core::config::{BackendKind, StagingConfig, StagingKind, StorageConfig};
use partmerge_core::result::AppResult;
use partmerge_core::traits::{PartStore, StorageBackend};

use crate::backends::{AppendStoreBackend, LocalFileBackend};
use crate::staging::{LocalPartStore, MemoryPartStore};

/// Create the merge destination backend selected by `config.backend`.
pub async fn build_backend(config: &StorageConfig) -> AppResult<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config.backend {
        BackendKind::Local => Arc::new(LocalFileBackend::new(&config.local.root_path).await?),
        BackendKind::Append => Arc::new(
            AppendStoreBackend::new(&config.append.root_path, config.append.group.clone()).await?,
        ),
    };

    info!(
        backend = backend.backend_type(),
        capability = ?backend.capability(),
        "Initialized storage backend"
    );
    Ok(backend)
}

/// Create the part store selected by `config.kind`.
pub async fn build_part_store(config: &StagingConfig) -> AppResult<Arc<dyn PartStore>> {
    let store: Arc<dyn PartStore> = match config.kind {
        StagingKind::Local => Arc::new(LocalPartStore::new(&config.root_path).await?),
        StagingKind::Memory => Arc::new(MemoryPartStore::new()),
    };

    info!(store = store.store_type(), "Initialized part store");
    Ok(store)
}
