use thiserror::Error;

/// Errors from storage backend operations.
///
/// Expected-absence cases surface as [`StorageError::NotFound`] rather than
/// a generic failure so callers can branch without string matching.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional update found the record in an unexpected state
    /// (e.g. retrying a queue item that is not `failed`).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether retrying the same call later could succeed.
    ///
    /// Drives queue backoff classification: connection/backend trouble is
    /// transient, missing records and state conflicts are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Backend(_))
    }
}
