//! In-process part store.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use tracing::debug;

use partmerge_core::error::{AppError, ErrorKind};
use partmerge_core::result::AppResult;
use partmerge_core::traits::PartStore;
use partmerge_core::types::{ByteStream, PartInfo, UploadId, UploadPart};

/// Part store holding every part in memory.
///
/// Buffers whole parts, so it suits tests and small ephemeral uploads
/// only. Tracks how many content streams handed out by
/// [`PartStore::list_upload_parts`] are still open.
#[derive(Debug, Clone, Default)]
pub struct MemoryPartStore {
    /// Parts per session, ordered by part number.
    parts: Arc<DashMap<UploadId, BTreeMap<u32, Bytes>>>,
    /// Number of live content streams.
    open_streams: Arc<AtomicUsize>,
}

impl MemoryPartStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of content streams that have been opened and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Whether any parts are held for the session.
    pub fn has_session(&self, upload_id: &UploadId) -> bool {
        self.parts.contains_key(upload_id)
    }
}

#[async_trait]
impl PartStore for MemoryPartStore {
    fn store_type(&self) -> &str {
        "memory"
    }

    async fn put_part(&self, part: UploadPart) -> AppResult<PartInfo> {
        let mut buf = BytesMut::new();
        let mut stream = part.content;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Stream read error", e))?;
            buf.extend_from_slice(&chunk);
        }

        let written = buf.len() as u64;
        if written != part.part_size {
            return Err(AppError::validation(format!(
                "Part {} declared {} bytes but {} were received",
                part.part_number, part.part_size, written
            )));
        }

        self.parts
            .entry(part.upload_id)
            .or_default()
            .insert(part.part_number, buf.freeze());

        debug!(
            upload_id = %part.upload_id,
            part_number = part.part_number,
            bytes = written,
            "Stored part in memory"
        );

        Ok(PartInfo {
            part_number: part.part_number,
            part_size: written,
        })
    }

    async fn list_parts(&self, upload_id: &UploadId) -> AppResult<Vec<PartInfo>> {
        Ok(self
            .parts
            .get(upload_id)
            .map(|parts| {
                parts
                    .iter()
                    .map(|(n, data)| PartInfo {
                        part_number: *n,
                        part_size: data.len() as u64,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_upload_parts(
        &self,
        upload_id: &UploadId,
        _object_name: &str,
    ) -> AppResult<Vec<UploadPart>> {
        let snapshot: Vec<(u32, Bytes)> = self
            .parts
            .get(upload_id)
            .map(|parts| parts.iter().map(|(n, d)| (*n, d.clone())).collect())
            .unwrap_or_default();

        Ok(snapshot
            .into_iter()
            .map(|(n, data)| {
                let size = data.len() as u64;
                let content = TrackedStream::new(data, self.open_streams.clone());
                UploadPart::new(*upload_id, n, size, Box::pin(content))
            })
            .collect())
    }

    async fn delete_parts(&self, upload_id: &UploadId) -> AppResult<()> {
        self.parts.remove(upload_id);
        Ok(())
    }
}

/// Single-chunk stream that counts itself as open until dropped.
struct TrackedStream {
    inner: ByteStream,
    open_streams: Arc<AtomicUsize>,
}

impl TrackedStream {
    fn new(data: Bytes, open_streams: Arc<AtomicUsize>) -> Self {
        open_streams.fetch_add(1, Ordering::SeqCst);
        Self {
            inner: Box::pin(futures::stream::once(async move { Ok(data) })),
            open_streams,
        }
    }
}

impl Stream for TrackedStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}
