//! Merge engine and its strategies.

pub mod engine;
pub mod observer;
mod strategy;

pub use engine::MergeEngine;
pub use observer::TracingObserver;
