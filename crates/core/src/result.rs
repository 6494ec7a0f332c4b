use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Outcome of running one automation against one context.
///
/// The executor converts every collaborator failure into a result with
/// `success == false`; no execution strategy propagates an error past it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AutomationResult {
    pub success: bool,

    /// Rendered reply text, if a reply was produced.
    #[serde(default)]
    pub response: Option<String>,

    /// The persisted outbound message, if one was created.
    #[serde(default)]
    pub message: Option<Message>,

    /// Failure cause, if `success == false`.
    #[serde(default)]
    pub error: Option<String>,
}

impl AutomationResult {
    /// A successful run that produced and persisted a reply.
    #[must_use]
    pub fn replied(response: String, message: Message) -> Self {
        Self {
            success: true,
            response: Some(response),
            message: Some(message),
            error: None,
        }
    }

    /// A successful run with side effects but no reply (trigger/scheduled
    /// automations without a response template).
    #[must_use]
    pub fn silent() -> Self {
        Self {
            success: true,
            response: None,
            message: None,
            error: None,
        }
    }

    /// A failed run; the cause is recorded, never thrown.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            message: None,
            error: Some(error.into()),
        }
    }
}
