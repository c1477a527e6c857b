#![forbid(unsafe_code)]

use std::path::PathBuf;

use quiver_net::NetError;
use quiver_storage::StorageError;
use thiserror::Error;

/// Bundle loading errors.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("remote origin timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cache file missing or unreadable: {}", .0.display())]
    MissingCacheFile(PathBuf),

    #[error("unknown bundle: {0}")]
    UnknownBundle(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("materialize failed: {0}")]
    Materialize(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("cancelled")]
    Cancelled,
}

impl From<NetError> for LoaderError {
    fn from(error: NetError) -> Self {
        match error {
            NetError::Timeout => Self::Timeout,
            NetError::RetryExhausted { ref source, .. } if source.is_timeout() => Self::Timeout,
            other => Self::Transport(other.to_string()),
        }
    }
}

pub type LoaderResult<T> = Result<T, LoaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_timeout_maps_to_timeout() {
        assert!(matches!(
            LoaderError::from(NetError::Timeout),
            LoaderError::Timeout
        ));
    }

    #[test]
    fn exhausted_timeout_retries_map_to_timeout() {
        let err = NetError::RetryExhausted {
            max_retries: 3,
            source: Box::new(NetError::Timeout),
        };
        assert!(matches!(LoaderError::from(err), LoaderError::Timeout));
    }

    #[test]
    fn http_failures_map_to_transport() {
        let err = NetError::http_status(502, "http://origin.test/index.txt".to_string());
        match LoaderError::from(err) {
            LoaderError::Transport(msg) => assert!(msg.contains("502")),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
