//! Trait definitions for the pluggable collaborators of the merge engine.

pub mod cancel;
pub mod lock;
pub mod observer;
pub mod part_store;
pub mod storage;

pub use cancel::CancellationRegistry;
pub use lock::{LockGuard, LockManager, with_lock};
pub use observer::{MergeObserver, NoopObserver};
pub use part_store::PartStore;
pub use storage::{BackendCapability, RandomAccessWriter, StorageBackend};
