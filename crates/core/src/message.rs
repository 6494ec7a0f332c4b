use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a message relative to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    /// From the contact to us; the only direction that drives automations.
    Inbound,
    /// From us to the contact.
    Outbound,
}

/// A persisted conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub direction: MessageDirection,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn is_inbound(&self) -> bool {
        self.direction == MessageDirection::Inbound
    }
}

/// Input for persisting a new message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub direction: MessageDirection,
    pub content: String,
}

impl NewMessage {
    /// An outbound message, the usual product of an automation.
    #[must_use]
    pub fn outbound(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            direction: MessageDirection::Outbound,
            content: content.into(),
        }
    }

    /// An inbound message, the usual product of webhook ingestion.
    #[must_use]
    pub fn inbound(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            direction: MessageDirection::Inbound,
            content: content.into(),
        }
    }
}
