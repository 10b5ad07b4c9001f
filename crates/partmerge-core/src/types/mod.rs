//! Core type definitions used across the partmerge workspace.

pub mod id;
pub mod merge;
pub mod part;
pub mod session;

pub use id::UploadId;
pub use merge::{CompleteMultipart, DestinationHandle, MergeOutcome};
pub use part::{ByteStream, MAX_RANDOM_ACCESS_PART_SIZE, PartInfo, UploadPart, sort_parts};
pub use session::{UploadSession, object_extension, validate_object_name};
