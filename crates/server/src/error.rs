use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use talaria_automation::ExecutionError;
use talaria_queue::QueueError;
use talaria_rules::ScheduleError;
use talaria_storage::StorageError;

/// Errors that can occur when running the Talaria server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A queue-level error surfaced through the API.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// A storage error surfaced through the API.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An automation execution error surfaced through the API.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Invalid schedule configuration on an automation write.
    #[error("invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),

    /// Authentication failed (missing or invalid credentials).
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Schedule(_) => StatusCode::BAD_REQUEST,
            Self::Queue(QueueError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Queue(QueueError::NotFound(_)) | Self::Storage(StorageError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::Execution(ExecutionError::Storage(StorageError::NotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            Self::Queue(QueueError::InvalidState(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: ServerError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(
            status_of(ServerError::Unauthorized("no token".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ServerError::Queue(QueueError::Validation("empty".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ServerError::Queue(QueueError::NotFound(7))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ServerError::Queue(QueueError::InvalidState("pending".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServerError::Storage(StorageError::NotFound("automation x".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ServerError::Config("broken".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
