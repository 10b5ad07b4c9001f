#![allow(dead_code)]

pub mod mocks;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use partmerge_core::traits::{PartStore, StorageBackend};
use partmerge_core::types::{UploadId, UploadPart};
use partmerge_service::{
    MemoryCancellationRegistry, MemoryLockManager, MergeEngine, UploadSessionManager,
};
use partmerge_storage::{AppendStoreBackend, LocalFileBackend, MemoryPartStore};

/// The three parts of the "HELLO" example, in upload order.
pub const HELLO_PARTS: [(u32, &str); 3] = [(2, "HELLOHELLO"), (1, "AAAAA"), (3, "ZZZ")];
pub const HELLO_MERGED: &str = "AAAAAHELLOHELLOZZZ";

#[derive(Debug, Clone, Copy)]
pub enum Destination {
    Local,
    Append,
}

/// Engine wired to in-memory coordination and a temp-dir backend.
pub struct Harness {
    pub engine: MergeEngine,
    pub sessions: Arc<UploadSessionManager>,
    pub parts: MemoryPartStore,
    pub locks: Arc<MemoryLockManager>,
    pub cancellations: Arc<MemoryCancellationRegistry>,
    pub backend_root: PathBuf,
    _dir: TempDir,
}

impl Harness {
    pub async fn new(destination: Destination) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let backend_root = dir.path().join("objects");
        let backend: Arc<dyn StorageBackend> = match destination {
            Destination::Local => Arc::new(LocalFileBackend::new(&backend_root).await.unwrap()),
            Destination::Append => Arc::new(
                AppendStoreBackend::new(&backend_root, "group1")
                    .await
                    .unwrap(),
            ),
        };
        Self::with_backend(dir, backend_root, backend)
    }

    /// Build a harness whose backend is produced from the real one by `wrap`.
    pub async fn wrapped(
        destination: Destination,
        wrap: impl FnOnce(Arc<dyn StorageBackend>) -> Arc<dyn StorageBackend>,
    ) -> Self {
        let base = Self::new(destination).await;
        let backend = wrap(base.engine.backend().clone());
        let Harness {
            _dir: dir,
            backend_root,
            ..
        } = base;
        Self::with_backend(dir, backend_root, backend)
    }

    fn with_backend(dir: TempDir, backend_root: PathBuf, backend: Arc<dyn StorageBackend>) -> Self {
        let parts = MemoryPartStore::new();
        let sessions = Arc::new(UploadSessionManager::new(Arc::new(parts.clone())));
        let locks = Arc::new(MemoryLockManager::new(Duration::from_secs(5)));
        let cancellations = Arc::new(MemoryCancellationRegistry::new());
        let engine = MergeEngine::new(
            sessions.clone(),
            locks.clone(),
            cancellations.clone(),
            backend,
        );

        Self {
            engine,
            sessions,
            parts,
            locks,
            cancellations,
            backend_root,
            _dir: dir,
        }
    }

    /// Engine sharing this harness's coordination state but using `part_store`.
    pub fn with_part_store(&self, part_store: Arc<dyn PartStore>) -> (MergeEngine, Arc<UploadSessionManager>) {
        let sessions = Arc::new(UploadSessionManager::new(part_store));
        let engine = MergeEngine::new(
            sessions.clone(),
            self.locks.clone(),
            self.cancellations.clone(),
            self.engine.backend().clone(),
        );
        (engine, sessions)
    }

    /// Initiate an upload and stage `parts` in the given order.
    pub async fn upload(&self, object_name: &str, parts: &[(u32, &str)]) -> UploadId {
        let id = self.sessions.initiate(object_name).unwrap();
        for (n, data) in parts {
            self.sessions
                .put_part(UploadPart::from_bytes(id, *n, data.as_bytes().to_vec()))
                .await
                .unwrap();
        }
        id
    }

    /// Every regular file under the backend root.
    pub fn stored_files(&self) -> Vec<PathBuf> {
        files_under(&self.backend_root)
    }
}

pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = std::fs::read_dir(root) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(files_under(&path));
        } else {
            files.push(path);
        }
    }
    files
}
