use thiserror::Error;

/// Errors from the AI collaborator.
///
/// The automation executor converts every variant into a failed
/// [`AutomationResult`](talaria_core::AutomationResult); nothing here is
/// process-fatal.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI configuration error: {0}")]
    Configuration(String),

    #[error("AI request failed: {0}")]
    Http(String),

    #[error("AI request timed out after {0}s")]
    Timeout(u64),

    #[error("AI provider returned an error: {0}")]
    Api(String),

    #[error("could not parse AI response: {0}")]
    Parse(String),
}
