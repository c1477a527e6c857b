#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type used by `quiver-storage`.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors produced by storage primitives.
///
/// Higher-level crates wrap this error to add domain context (bundle name,
/// URL, etc.).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid cache key: {0}")]
    InvalidKey(String),

    #[error("write failed: {0}")]
    Failed(String),
}
