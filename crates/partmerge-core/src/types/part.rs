//! Upload parts and their content streams.

use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};

use super::id::UploadId;

/// A byte stream type used for part contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Largest part a random-access merge accepts, exclusive (4 GiB).
///
/// Positioned transfers report progress in 32-bit byte counts, so every
/// part handed to a random-access backend must stay strictly below this.
pub const MAX_RANDOM_ACCESS_PART_SIZE: u64 = 1 << 32;

/// One caller-submitted chunk of the final object.
///
/// The content stream is owned by whoever holds the part; dropping the
/// part closes the stream.
pub struct UploadPart {
    /// Session the part belongs to.
    pub upload_id: UploadId,
    /// Caller-assigned ordering key, unique within the session.
    pub part_number: u32,
    /// Size of the content in bytes.
    pub part_size: u64,
    /// Readable content.
    pub content: ByteStream,
}

impl UploadPart {
    /// Create a part from an arbitrary byte stream.
    pub fn new(upload_id: UploadId, part_number: u32, part_size: u64, content: ByteStream) -> Self {
        Self {
            upload_id,
            part_number,
            part_size,
            content,
        }
    }

    /// Create a part whose content is a single in-memory buffer.
    pub fn from_bytes(upload_id: UploadId, part_number: u32, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let part_size = data.len() as u64;
        Self::new(
            upload_id,
            part_number,
            part_size,
            Box::pin(futures::stream::once(async move { Ok(data) })),
        )
    }

    /// Summary of this part without its content.
    pub fn info(&self) -> PartInfo {
        PartInfo {
            part_number: self.part_number,
            part_size: self.part_size,
        }
    }
}

impl fmt::Debug for UploadPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadPart")
            .field("upload_id", &self.upload_id)
            .field("part_number", &self.part_number)
            .field("part_size", &self.part_size)
            .finish_non_exhaustive()
    }
}

/// Summary projection of an [`UploadPart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartInfo {
    /// Part number.
    pub part_number: u32,
    /// Size in bytes.
    pub part_size: u64,
}

/// Sort parts ascending by part number.
///
/// The sort is stable; ties cannot occur because part numbers are unique
/// within a session.
pub fn sort_parts(parts: &mut [UploadPart]) {
    parts.sort_by_key(|p| p.part_number);
}
