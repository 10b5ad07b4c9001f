//! Part store backed by a staging directory on local disk.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::{TryStreamExt, stream};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

use partmerge_core::error::{AppError, ErrorKind};
use partmerge_core::result::AppResult;
use partmerge_core::traits::PartStore;
use partmerge_core::types::{ByteStream, PartInfo, UploadId, UploadPart};

use crate::io::copy_stream;

const PART_SUFFIX: &str = ".part";

/// Stores each part as `{root}/{upload_id}/{part_number:010}.part`.
///
/// Parts are streamed to a hidden temp file and renamed into place, so a
/// reader never sees a half-written part and concurrent puts of the same
/// number resolve to whichever rename lands last.
#[derive(Debug, Clone)]
pub struct LocalPartStore {
    /// Root of the staging area.
    root: PathBuf,
}

impl LocalPartStore {
    /// Create a new part store rooted at the given path.
    pub async fn new(root_path: impl AsRef<Path>) -> AppResult<Self> {
        let root = root_path.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create staging root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Directory holding one session's parts.
    pub fn upload_dir(&self, upload_id: &UploadId) -> PathBuf {
        self.root.join(upload_id.to_string())
    }

    /// Path of a stored part.
    pub fn part_path(&self, upload_id: &UploadId, part_number: u32) -> PathBuf {
        self.upload_dir(upload_id)
            .join(format!("{part_number:010}{PART_SUFFIX}"))
    }

    fn parse_part_number(file_name: &str) -> Option<u32> {
        if file_name.starts_with('.') {
            return None;
        }
        file_name.strip_suffix(PART_SUFFIX)?.parse().ok()
    }
}

/// Stream a part file, opening it only when the stream is first polled.
///
/// The file must still hold `size` bytes when opened; a part replaced after
/// listing fails the stream instead of being merged at the wrong length.
fn open_on_first_poll(path: PathBuf, part_number: u32, size: u64) -> ByteStream {
    let opened = stream::once(async move {
        let file = fs::File::open(&path).await?;
        let len = file.metadata().await?.len();
        if len != size {
            return Err(io::Error::other(format!(
                "part {part_number} was replaced during the merge: listed {size} bytes, found {len}"
            )));
        }
        Ok::<_, io::Error>(ReaderStream::new(file))
    });
    Box::pin(opened.try_flatten())
}

#[async_trait]
impl PartStore for LocalPartStore {
    fn store_type(&self) -> &str {
        "local"
    }

    async fn put_part(&self, part: UploadPart) -> AppResult<PartInfo> {
        let dir = self.upload_dir(&part.upload_id);
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create part directory: {}", dir.display()),
                e,
            )
        })?;

        let temp_path = dir.join(format!(".{:010}.{}.tmp", part.part_number, Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create part file: {}", temp_path.display()),
                e,
            )
        })?;

        let written = match copy_stream(&mut file, part.content).await {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };
        drop(file);

        if written != part.part_size {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AppError::validation(format!(
                "Part {} declared {} bytes but {} were received",
                part.part_number, part.part_size, written
            )));
        }

        let final_path = self.part_path(&part.upload_id, part.part_number);
        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to commit part file: {}", final_path.display()),
                e,
            ));
        }

        debug!(
            upload_id = %part.upload_id,
            part_number = part.part_number,
            bytes = written,
            "Stored part"
        );

        Ok(PartInfo {
            part_number: part.part_number,
            part_size: written,
        })
    }

    async fn list_parts(&self, upload_id: &UploadId) -> AppResult<Vec<PartInfo>> {
        let dir = self.upload_dir(upload_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to list parts: {}", dir.display()),
                    e,
                ));
            }
        };

        let mut parts = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to read directory entry", e)
        })? {
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(part_number) = Self::parse_part_number(&name) else {
                continue;
            };
            let meta = entry.metadata().await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to get part metadata", e)
            })?;
            parts.push(PartInfo {
                part_number,
                part_size: meta.len(),
            });
        }

        parts.sort_by_key(|p| p.part_number);
        Ok(parts)
    }

    async fn list_upload_parts(
        &self,
        upload_id: &UploadId,
        object_name: &str,
    ) -> AppResult<Vec<UploadPart>> {
        let infos = self.list_parts(upload_id).await?;
        let parts: Vec<UploadPart> = infos
            .into_iter()
            .map(|info| {
                let path = self.part_path(upload_id, info.part_number);
                UploadPart::new(
                    *upload_id,
                    info.part_number,
                    info.part_size,
                    open_on_first_poll(path, info.part_number, info.part_size),
                )
            })
            .collect();

        debug!(
            upload_id = %upload_id,
            object_name,
            parts = parts.len(),
            "Opened staged parts"
        );
        Ok(parts)
    }

    async fn delete_parts(&self, upload_id: &UploadId) -> AppResult<()> {
        let dir = self.upload_dir(upload_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(upload_id = %upload_id, "Deleted staged parts");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete parts: {}", dir.display()),
                e,
            )),
        }
    }
}
