//! # partmerge-core
//!
//! Core crate for partmerge. Contains the upload domain types, the
//! traits every pluggable collaborator implements (part stores, lock
//! managers, cancellation registries, storage backends, merge observers),
//! configuration schemas, and the unified error system.
//!
//! This crate has **no** internal dependencies on other partmerge crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
