//! Appender-file store emulated on local disk.
//!
//! Mirrors the write model of distributed stores that only offer
//! "upload an appender file" followed by "append to it": the store picks
//! the object's path, and the caller can only extend it at the end.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use partmerge_core::error::{AppError, ErrorKind};
use partmerge_core::result::AppResult;
use partmerge_core::traits::{BackendCapability, StorageBackend};
use partmerge_core::types::{ByteStream, DestinationHandle, validate_object_name};

use crate::io::{copy_stream, size_mismatch};

/// Virtual store path prefix for the first storage path of a group.
const STORE_PATH_PREFIX: &str = "M00";

/// Append-only store placing objects at `{group}/M00/{XX}/{YY}/{id}.{ext}`.
#[derive(Debug, Clone)]
pub struct AppendStoreBackend {
    /// Root directory of the store's data.
    root: PathBuf,
    /// Group new objects are placed in.
    group: String,
}

impl AppendStoreBackend {
    /// Create a new append store rooted at the given path.
    pub async fn new(root_path: impl AsRef<Path>, group: impl Into<String>) -> AppResult<Self> {
        let group = group.into();
        validate_object_name(&group)
            .map_err(|e| AppError::configuration(format!("Invalid store group: {}", e.message)))?;

        let root = root_path.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create store root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root, group })
    }

    /// Generate a fresh store path for an object with `extension`.
    fn generate_store_path(&self, extension: &str) -> String {
        let id = Uuid::new_v4();
        let bytes = id.as_bytes();
        let file_name = if extension.is_empty() {
            id.simple().to_string()
        } else {
            format!("{}.{extension}", id.simple())
        };
        format!(
            "{}/{STORE_PATH_PREFIX}/{:02X}/{:02X}/{file_name}",
            self.group, bytes[0], bytes[1]
        )
    }

    /// Resolve a store path to its file on disk.
    fn resolve(&self, store_path: &str) -> AppResult<PathBuf> {
        validate_object_name(store_path)?;
        Ok(self.root.join(store_path))
    }
}

#[async_trait]
impl StorageBackend for AppendStoreBackend {
    fn backend_type(&self) -> &str {
        "append"
    }

    fn capability(&self) -> BackendCapability {
        BackendCapability::AppendOnly
    }

    async fn create_from_stream(
        &self,
        content: ByteStream,
        size: u64,
        extension: &str,
    ) -> AppResult<DestinationHandle> {
        let store_path = self.generate_store_path(extension);
        let full_path = self.resolve(&store_path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create store directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create appender file: {store_path}"),
                    e,
                )
            })?;

        let handle = DestinationHandle {
            name: store_path,
            path: full_path.display().to_string(),
        };

        let written = match copy_stream(&mut file, content).await {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&full_path).await;
                return Err(e);
            }
        };
        if written != size {
            drop(file);
            let _ = fs::remove_file(&full_path).await;
            return Err(size_mismatch(&handle.name, size, written));
        }

        debug!(store_path = %handle.name, bytes = written, "Created appender file");
        Ok(handle)
    }

    async fn append_to_destination(
        &self,
        destination: &DestinationHandle,
        content: ByteStream,
        size: u64,
    ) -> AppResult<()> {
        let full_path = self.resolve(&destination.name)?;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&full_path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AppError::not_found(format!("Appender file not found: {}", destination.name))
                } else {
                    AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to open appender file: {}", destination.name),
                        e,
                    )
                }
            })?;

        let written = copy_stream(&mut file, content).await?;
        if written != size {
            return Err(size_mismatch(&destination.name, size, written));
        }

        debug!(store_path = %destination.name, bytes = written, "Appended to file");
        Ok(())
    }

    async fn delete_destination(&self, destination: &DestinationHandle) -> AppResult<()> {
        let full_path = self.resolve(&destination.name)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => {
                debug!(store_path = %destination.name, "Deleted appender file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete appender file: {}", destination.name),
                e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn stream_of(data: &'static str) -> ByteStream {
        Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }))
    }

    #[tokio::test]
    async fn test_create_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppendStoreBackend::new(dir.path(), "group1").await.unwrap();

        let handle = store
            .create_from_stream(stream_of("AAAAA"), 5, "mp4")
            .await
            .unwrap();
        assert!(handle.name.starts_with("group1/M00/"));
        assert!(handle.name.ends_with(".mp4"));

        store
            .append_to_destination(&handle, stream_of("ZZZ"), 3)
            .await
            .unwrap();

        let data = fs::read(&handle.path).await.unwrap();
        assert_eq!(data, b"AAAAAZZZ");

        let report = store.report_final_path(&handle);
        assert_eq!(report.object_name, handle.name);
    }

    #[tokio::test]
    async fn test_store_path_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppendStoreBackend::new(dir.path(), "g").await.unwrap();
        let path = store.generate_store_path("");
        assert!(!path.rsplit('/').next().unwrap().contains('.'));
        assert_eq!(path.split('/').count(), 5);
    }

    #[tokio::test]
    async fn test_create_size_mismatch_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppendStoreBackend::new(dir.path(), "group1").await.unwrap();

        let err = store
            .create_from_stream(stream_of("abc"), 4, "bin")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_append_to_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppendStoreBackend::new(dir.path(), "group1").await.unwrap();
        let handle = DestinationHandle {
            name: "group1/M00/00/00/missing.bin".to_string(),
            path: String::new(),
        };

        let err = store
            .append_to_destination(&handle, stream_of("x"), 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_destination() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppendStoreBackend::new(dir.path(), "group1").await.unwrap();
        let handle = store
            .create_from_stream(stream_of("data"), 4, "")
            .await
            .unwrap();

        store.delete_destination(&handle).await.unwrap();
        assert!(!Path::new(&handle.path).exists());
        store.delete_destination(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_random_access_not_supported() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppendStoreBackend::new(dir.path(), "group1").await.unwrap();
        assert_eq!(store.capability(), BackendCapability::AppendOnly);
        assert!(store.open_for_random_write("x.bin").await.is_err());
    }
}
