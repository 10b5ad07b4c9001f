//! Test doubles: failure-injecting and recording backends, a part store
//! with declared sizes, and observers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;

use partmerge_core::error::AppError;
use partmerge_core::result::AppResult;
use partmerge_core::traits::{
    BackendCapability, CancellationRegistry, MergeObserver, PartStore, RandomAccessWriter,
    StorageBackend,
};
use partmerge_core::types::{
    ByteStream, CompleteMultipart, DestinationHandle, MAX_RANDOM_ACCESS_PART_SIZE, PartInfo,
    UploadId, UploadPart,
};
use partmerge_service::MemoryCancellationRegistry;

/// Delegates to a real backend but fails the n-th part write (0-based).
#[derive(Debug)]
pub struct FailingBackend {
    inner: Arc<dyn StorageBackend>,
    fail_at: usize,
    fail_delete: bool,
    writes: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
}

impl FailingBackend {
    pub fn new(inner: Arc<dyn StorageBackend>, fail_at: usize) -> Self {
        Self {
            inner,
            fail_at,
            fail_delete: false,
            writes: Arc::new(AtomicUsize::new(0)),
            deletes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Also fail every `delete_destination` call.
    pub fn failing_deletes(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn delete_calls(&self) -> Arc<AtomicUsize> {
        self.deletes.clone()
    }

    fn next_write(writes: &AtomicUsize, fail_at: usize) -> AppResult<()> {
        if writes.fetch_add(1, Ordering::SeqCst) == fail_at {
            return Err(AppError::storage("injected write failure"));
        }
        Ok(())
    }
}

struct FailingWriter {
    inner: Box<dyn RandomAccessWriter>,
    fail_at: usize,
    writes: Arc<AtomicUsize>,
}

#[async_trait]
impl RandomAccessWriter for FailingWriter {
    async fn write_at(&mut self, offset: u64, content: ByteStream, size: u64) -> AppResult<u64> {
        FailingBackend::next_write(&self.writes, self.fail_at)?;
        self.inner.write_at(offset, content, size).await
    }

    async fn finish(self: Box<Self>) -> AppResult<()> {
        self.inner.finish().await
    }
}

#[async_trait]
impl StorageBackend for FailingBackend {
    fn backend_type(&self) -> &str {
        "failing"
    }

    fn capability(&self) -> BackendCapability {
        self.inner.capability()
    }

    async fn open_for_random_write(
        &self,
        object_name: &str,
    ) -> AppResult<(DestinationHandle, Box<dyn RandomAccessWriter>)> {
        let (handle, inner) = self.inner.open_for_random_write(object_name).await?;
        let writer = FailingWriter {
            inner,
            fail_at: self.fail_at,
            writes: self.writes.clone(),
        };
        Ok((handle, Box::new(writer)))
    }

    async fn create_from_stream(
        &self,
        content: ByteStream,
        size: u64,
        extension: &str,
    ) -> AppResult<DestinationHandle> {
        Self::next_write(&self.writes, self.fail_at)?;
        self.inner.create_from_stream(content, size, extension).await
    }

    async fn append_to_destination(
        &self,
        destination: &DestinationHandle,
        content: ByteStream,
        size: u64,
    ) -> AppResult<()> {
        Self::next_write(&self.writes, self.fail_at)?;
        self.inner
            .append_to_destination(destination, content, size)
            .await
    }

    async fn delete_destination(&self, destination: &DestinationHandle) -> AppResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete {
            return Err(AppError::storage("injected delete failure"));
        }
        self.inner.delete_destination(destination).await
    }

    fn report_final_path(&self, destination: &DestinationHandle) -> CompleteMultipart {
        self.inner.report_final_path(destination)
    }
}

/// Part store reporting parts of fixed declared sizes, numbered from 1.
/// Content streams are empty; only declared sizes matter.
#[derive(Debug)]
pub struct DeclaredSizePartStore {
    sizes: Vec<u64>,
    pub deleted: AtomicUsize,
}

impl DeclaredSizePartStore {
    pub fn new(sizes: Vec<u64>) -> Self {
        Self {
            sizes,
            deleted: AtomicUsize::new(0),
        }
    }

    /// One small part followed by one part at the 4 GiB limit.
    pub fn oversized() -> Self {
        Self::new(vec![5, MAX_RANDOM_ACCESS_PART_SIZE])
    }

    fn infos(&self) -> Vec<PartInfo> {
        self.sizes
            .iter()
            .zip(1u32..)
            .map(|(&part_size, part_number)| PartInfo {
                part_number,
                part_size,
            })
            .collect()
    }
}

#[async_trait]
impl PartStore for DeclaredSizePartStore {
    fn store_type(&self) -> &str {
        "declared-size"
    }

    async fn put_part(&self, part: UploadPart) -> AppResult<PartInfo> {
        Ok(part.info())
    }

    async fn list_parts(&self, _upload_id: &UploadId) -> AppResult<Vec<PartInfo>> {
        Ok(self.infos())
    }

    async fn list_upload_parts(
        &self,
        upload_id: &UploadId,
        _object_name: &str,
    ) -> AppResult<Vec<UploadPart>> {
        Ok(self
            .infos()
            .into_iter()
            .map(|info| {
                let empty: ByteStream =
                    Box::pin(stream::empty::<Result<Bytes, std::io::Error>>());
                UploadPart::new(*upload_id, info.part_number, info.part_size, empty)
            })
            .collect())
    }

    async fn delete_parts(&self, _upload_id: &UploadId) -> AppResult<()> {
        self.deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Random-access backend that records each `write_at` call instead of
/// storing bytes.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    writes: Arc<Mutex<Vec<(u64, u64)>>>,
}

impl RecordingBackend {
    /// `(offset, size)` of every write, in call order.
    pub fn writes(&self) -> Vec<(u64, u64)> {
        self.writes.lock().unwrap().clone()
    }
}

struct RecordingWriter {
    writes: Arc<Mutex<Vec<(u64, u64)>>>,
}

#[async_trait]
impl RandomAccessWriter for RecordingWriter {
    async fn write_at(&mut self, offset: u64, _content: ByteStream, size: u64) -> AppResult<u64> {
        self.writes.lock().unwrap().push((offset, size));
        Ok(size)
    }

    async fn finish(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for RecordingBackend {
    fn backend_type(&self) -> &str {
        "recording"
    }

    fn capability(&self) -> BackendCapability {
        BackendCapability::RandomAccess
    }

    async fn open_for_random_write(
        &self,
        object_name: &str,
    ) -> AppResult<(DestinationHandle, Box<dyn RandomAccessWriter>)> {
        let handle = DestinationHandle {
            name: object_name.to_string(),
            path: format!("recording://{object_name}"),
        };
        let writer = RecordingWriter {
            writes: self.writes.clone(),
        };
        Ok((handle, Box::new(writer)))
    }

    async fn delete_destination(&self, _destination: &DestinationHandle) -> AppResult<()> {
        Ok(())
    }
}

/// Requests cancellation once `after` parts have been merged.
pub struct CancelAfter {
    registry: Arc<MemoryCancellationRegistry>,
    after: usize,
    merged: AtomicUsize,
}

impl CancelAfter {
    pub fn new(registry: Arc<MemoryCancellationRegistry>, after: usize) -> Self {
        Self {
            registry,
            after,
            merged: AtomicUsize::new(0),
        }
    }
}

impl MergeObserver for CancelAfter {
    fn on_part_merged(&self, upload_id: &UploadId, _part_number: u32, _offset: u64, _bytes: u64) {
        if self.merged.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            futures::executor::block_on(self.registry.request_cancel(upload_id)).unwrap();
        }
    }
}

/// Records every callback as a short string.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl MergeObserver for RecordingObserver {
    fn on_merge_started(&self, _upload_id: &UploadId, part_count: usize) {
        self.push(format!("started:{part_count}"));
    }

    fn on_part_merged(&self, _upload_id: &UploadId, part_number: u32, offset: u64, bytes: u64) {
        self.push(format!("part:{part_number}@{offset}+{bytes}"));
    }

    fn on_merge_completed(&self, _upload_id: &UploadId, _result: &CompleteMultipart) {
        self.push("completed".to_string());
    }

    fn on_merge_cancelled(&self, _upload_id: &UploadId, parts_merged: usize) {
        self.push(format!("cancelled:{parts_merged}"));
    }

    fn on_merge_failed(&self, _upload_id: &UploadId, error: &AppError) {
        self.push(format!("failed:{}", error.kind));
    }
}
