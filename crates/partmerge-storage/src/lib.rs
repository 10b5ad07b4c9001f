//! # partmerge-storage
//!
//! Part stores (staging directory, in-memory) and merge destination
//! backends (local random-access files, local appender-file store) for
//! partmerge.

pub mod backends;
pub mod factory;
mod io;
pub mod staging;

pub use backends::{AppendStoreBackend, LocalFileBackend};
pub use factory::{build_backend, build_part_store};
pub use staging::{LocalPartStore, MemoryPartStore};
