use thiserror::Error;

use talaria_ai::AiError;
use talaria_storage::StorageError;

/// Failures inside an automation's action/response pipeline.
///
/// These never cross the executor boundary: [`AutomationExecutor::execute`]
/// (crate::AutomationExecutor) converts every variant into a failed
/// [`AutomationResult`](talaria_core::AutomationResult).
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    #[error("webhook request failed: {0}")]
    Http(String),

    #[error("webhook returned HTTP {status}")]
    WebhookStatus { status: u16 },

    #[error("action {kind} failed: {reason}")]
    Action { kind: &'static str, reason: String },

    #[error("automation misconfigured: {0}")]
    InvalidConfig(String),
}
