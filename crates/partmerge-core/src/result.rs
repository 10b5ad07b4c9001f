//! Convenience result type alias for partmerge.

use crate::error::AppError;

/// A specialized `Result` type for partmerge operations.
pub type AppResult<T> = Result<T, AppError>;
