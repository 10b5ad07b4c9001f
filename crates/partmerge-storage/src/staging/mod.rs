//! Part store implementations.

pub mod local;
pub mod memory;

pub use local::LocalPartStore;
pub use memory::MemoryPartStore;
