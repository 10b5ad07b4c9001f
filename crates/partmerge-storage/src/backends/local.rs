//! Local filesystem backend with positioned writes.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncSeekExt;
use tracing::debug;
use uuid::Uuid;

use partmerge_core::error::{AppError, ErrorKind};
use partmerge_core::result::AppResult;
use partmerge_core::traits::{BackendCapability, RandomAccessWriter, StorageBackend};
use partmerge_core::types::{ByteStream, CompleteMultipart, DestinationHandle, validate_object_name};

use crate::io::{copy_stream, size_mismatch};

/// Suffix of a destination that has not been published yet.
const PARTIAL_SUFFIX: &str = ".partial";

/// Writes merged objects to `{root}/{object_name}`.
///
/// A merge writes into a hidden `.{name}.{uuid}.partial` file beside the
/// object and renames it into place on `finish`, so an existing object
/// under the same name is untouched until the new one is complete.
#[derive(Debug, Clone)]
pub struct LocalFileBackend {
    /// Root directory for all merged objects.
    root: PathBuf,
}

impl LocalFileBackend {
    /// Create a new local backend rooted at the given path.
    pub async fn new(root_path: impl AsRef<Path>) -> AppResult<Self> {
        let root = root_path.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Resolve an object name to an absolute path within the root.
    fn resolve(&self, object_name: &str) -> AppResult<PathBuf> {
        validate_object_name(object_name)?;
        Ok(self.root.join(object_name))
    }

    /// Ensure the parent directory of a path exists.
    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalFileBackend {
    fn backend_type(&self) -> &str {
        "local"
    }

    fn capability(&self) -> BackendCapability {
        BackendCapability::RandomAccess
    }

    async fn open_for_random_write(
        &self,
        object_name: &str,
    ) -> AppResult<(DestinationHandle, Box<dyn RandomAccessWriter>)> {
        let final_path = self.resolve(object_name)?;
        self.ensure_parent(&final_path).await?;

        let name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| object_name.to_string());
        let temp_path = final_path.with_file_name(format!(
            ".{name}.{}{PARTIAL_SUFFIX}",
            Uuid::new_v4().simple()
        ));

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create file: {object_name}"),
                    e,
                )
            })?;

        let handle = DestinationHandle {
            name,
            path: temp_path.display().to_string(),
        };

        debug!(path = %handle.path, "Opened destination for positioned writes");
        Ok((
            handle,
            Box::new(LocalFileWriter {
                file,
                temp_path,
                final_path,
            }),
        ))
    }

    async fn delete_destination(&self, destination: &DestinationHandle) -> AppResult<()> {
        match fs::remove_file(&destination.path).await {
            Ok(()) => {
                debug!(path = %destination.path, "Deleted destination");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete file: {}", destination.path),
                e,
            )),
        }
    }

    fn report_final_path(&self, destination: &DestinationHandle) -> CompleteMultipart {
        let full_path = Path::new(&destination.path)
            .parent()
            .map(|dir| dir.join(&destination.name))
            .unwrap_or_else(|| PathBuf::from(&destination.name));
        CompleteMultipart {
            object_name: destination.name.clone(),
            full_path: full_path.display().to_string(),
        }
    }
}

/// Destination being written under a hidden name next to its final path.
struct LocalFileWriter {
    file: fs::File,
    temp_path: PathBuf,
    final_path: PathBuf,
}

#[async_trait]
impl RandomAccessWriter for LocalFileWriter {
    async fn write_at(&mut self, offset: u64, content: ByteStream, size: u64) -> AppResult<u64> {
        self.file.seek(SeekFrom::Start(offset)).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to seek to {offset} in {}", self.temp_path.display()),
                e,
            )
        })?;

        let written = copy_stream(&mut self.file, content).await?;
        if written != size {
            return Err(size_mismatch(
                &format!("offset {offset} of {}", self.temp_path.display()),
                size,
                written,
            ));
        }
        Ok(written)
    }

    /// Sync the hidden file and rename it onto the object path.
    async fn finish(self: Box<Self>) -> AppResult<()> {
        let Self {
            file,
            temp_path,
            final_path,
        } = *self;

        let synced = file.sync_all().await;
        drop(file);
        if let Err(e) = synced {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to sync {}", temp_path.display()),
                e,
            ));
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to publish {}", final_path.display()),
                e,
            ));
        }

        debug!(path = %final_path.display(), "Published destination");
        Ok(())
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
    async fn test_positioned_writes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFileBackend::new(dir.path()).await.unwrap();

        let (handle, mut writer) = backend.open_for_random_write("out/file.txt").await.unwrap();
        assert_eq!(handle.name, "file.txt");

        writer.write_at(5, stream_of("world"), 5).await.unwrap();
        writer.write_at(0, stream_of("hello"), 5).await.unwrap();
        writer.finish().await.unwrap();

        let data = fs::read(dir.path().join("out/file.txt")).await.unwrap();
        assert_eq!(data, b"helloworld");

        let report = backend.report_final_path(&handle);
        assert_eq!(report.object_name, "file.txt");
        assert_eq!(
            report.full_path,
            dir.path().join("out/file.txt").display().to_string()
        );
        assert!(!Path::new(&handle.path).exists());
    }

    #[tokio::test]
    async fn test_existing_object_untouched_until_finish() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFileBackend::new(dir.path()).await.unwrap();
        fs::write(dir.path().join("report.txt"), "ORIGINAL-DATA")
            .await
            .unwrap();

        let (handle, mut writer) = backend.open_for_random_write("report.txt").await.unwrap();
        assert_ne!(handle.path, dir.path().join("report.txt").display().to_string());
        writer.write_at(0, stream_of("new"), 3).await.unwrap();
        drop(writer);
        backend.delete_destination(&handle).await.unwrap();

        let data = fs::read_to_string(dir.path().join("report.txt")).await.unwrap();
        assert_eq!(data, "ORIGINAL-DATA");
        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["report.txt"]);

        let (_handle, mut writer) = backend.open_for_random_write("report.txt").await.unwrap();
        writer.write_at(0, stream_of("replaced"), 8).await.unwrap();
        writer.finish().await.unwrap();
        let data = fs::read_to_string(dir.path().join("report.txt")).await.unwrap();
        assert_eq!(data, "replaced");
    }

    #[tokio::test]
    async fn test_short_write_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFileBackend::new(dir.path()).await.unwrap();

        let (_handle, mut writer) = backend.open_for_random_write("f.bin").await.unwrap();
        let err = writer.write_at(0, stream_of("abc"), 10).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_delete_destination_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFileBackend::new(dir.path()).await.unwrap();

        let (handle, writer) = backend.open_for_random_write("gone.bin").await.unwrap();
        drop(writer);
        assert!(Path::new(&handle.path).exists());
        backend.delete_destination(&handle).await.unwrap();
        assert!(!Path::new(&handle.path).exists());
        assert!(!dir.path().join("gone.bin").exists());
        backend.delete_destination(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_object_name() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFileBackend::new(dir.path()).await.unwrap();

        let err = backend
            .open_for_random_write("../escape.bin")
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_append_is_not_supported() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFileBackend::new(dir.path()).await.unwrap();

        let err = backend
            .create_from_stream(stream_of("x"), 1, "bin")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotImplemented);
    }
}
