//! Merge destination backends.

pub mod append;
pub mod local;

pub use append::AppendStoreBackend;
pub use local::LocalFileBackend;
