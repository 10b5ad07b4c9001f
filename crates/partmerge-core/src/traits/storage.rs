//! Storage backend trait for pluggable merge destinations.

use async_trait::async_trait;

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::{ByteStream, CompleteMultipart, DestinationHandle};

/// Which merge strategy a backend can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendCapability {
    /// Writes at arbitrary offsets into one open destination.
    RandomAccess,
    /// Create once with initial content, then append only.
    AppendOnly,
}

/// Writer for a destination opened on a random-access backend.
#[async_trait]
pub trait RandomAccessWriter: Send {
    /// Write the whole of `content` starting at `offset`.
    ///
    /// `size` is the expected content length. Returns the number of bytes
    /// written.
    async fn write_at(&mut self, offset: u64, content: ByteStream, size: u64) -> AppResult<u64>;

    /// Flush the destination and make it visible under its object name.
    async fn finish(self: Box<Self>) -> AppResult<()>;
}

/// Trait for merge destination backends.
///
/// Every backend declares one [`BackendCapability`] and implements the
/// operations that capability needs; the remaining operations keep their
/// default `NotImplemented` behaviour.
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Return the backend type name (e.g., "local", "append").
    fn backend_type(&self) -> &str;

    /// The merge strategy this backend supports.
    fn capability(&self) -> BackendCapability;

    /// Open a fresh destination for `object_name` for positioned writes.
    ///
    /// An existing object under that name stays intact until the writer's
    /// `finish` succeeds.
    async fn open_for_random_write(
        &self,
        object_name: &str,
    ) -> AppResult<(DestinationHandle, Box<dyn RandomAccessWriter>)> {
        let _ = object_name;
        Err(AppError::not_implemented(format!(
            "{} backend does not support random-access writes",
            self.backend_type()
        )))
    }

    /// Create a new appendable destination holding `content`.
    async fn create_from_stream(
        &self,
        content: ByteStream,
        size: u64,
        extension: &str,
    ) -> AppResult<DestinationHandle> {
        let _ = (content, size, extension);
        Err(AppError::not_implemented(format!(
            "{} backend does not support appendable objects",
            self.backend_type()
        )))
    }

    /// Append `content` to an existing destination.
    async fn append_to_destination(
        &self,
        destination: &DestinationHandle,
        content: ByteStream,
        size: u64,
    ) -> AppResult<()> {
        let _ = (destination, content, size);
        Err(AppError::not_implemented(format!(
            "{} backend does not support appends",
            self.backend_type()
        )))
    }

    /// Delete a destination, complete or partial.
    async fn delete_destination(&self, destination: &DestinationHandle) -> AppResult<()>;

    /// The name and full path to report for a finished destination.
    fn report_final_path(&self, destination: &DestinationHandle) -> CompleteMultipart {
        CompleteMultipart {
            object_name: destination.name.clone(),
            full_path: destination.path.clone(),
        }
    }
}
