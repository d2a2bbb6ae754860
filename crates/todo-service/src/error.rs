//! Error taxonomy for todo operations.

use thiserror::Error;
use todo_store::StoreError;

/// Result type alias for todo service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by todo operations.
///
/// `InvalidInput` and `NotFound` are client errors and safe to report
/// verbatim; `Store` means the backend misbehaved and the caller may retry.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("todo not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
