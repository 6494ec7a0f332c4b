use thiserror::Error;

use talaria_storage::StorageError;

/// Errors surfaced by the webhook queue's management operations.
///
/// The processing loop itself never returns these: per-item failures are
/// classified into status transitions plus `last_error`, and the loop keeps
/// running.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Bad enqueue input, rejected before persistence.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("queue item {0} not found")]
    NotFound(u64),

    /// A management operation found the item in the wrong state
    /// (e.g. retrying an item that is not `failed`).
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl QueueError {
    /// Map a storage error for an operation on a specific item id,
    /// converting expected-absence and state conflicts into their
    /// queue-level variants.
    pub(crate) fn from_storage(id: u64, error: StorageError) -> Self {
        match error {
            StorageError::NotFound(_) => Self::NotFound(id),
            StorageError::Conflict(reason) => Self::InvalidState(reason),
            other => Self::Storage(other),
        }
    }
}

impl From<StorageError> for QueueError {
    fn from(error: StorageError) -> Self {
        Self::Storage(error)
    }
}
