//! # partmerge-service
//!
//! Coordination layer for multipart uploads: session bookkeeping,
//! per-upload locking, cooperative cancellation and the merge engine that
//! reassembles staged parts on a storage backend.
//!
//! Components take their collaborators as `Arc<dyn Trait>` at construction
//! time; `MergeEngine::from_config` wires the default in-memory set.

pub mod cancel;
pub mod lock;
pub mod merge;
pub mod session;

pub use cancel::MemoryCancellationRegistry;
pub use lock::MemoryLockManager;
pub use merge::{MergeEngine, TracingObserver};
pub use session::UploadSessionManager;
