use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// HTTP method for an outbound webhook action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

/// A side-effecting step of a `trigger` or `scheduled` automation.
///
/// Closed set of variants; the action runner resolves each through a single
/// `match`, so adding a kind is a compile-checked change. String parameters
/// pass through the template engine before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Move the conversation to another status.
    UpdateConversationStatus { status: String },

    /// Assign the conversation to a user.
    AssignConversation { user_id: String },

    /// Add a tag to the contact. Adding an existing tag is a no-op.
    AddTag { tag: String },

    /// Remove a tag from the contact. Removing an absent tag is a no-op.
    RemoveTag { tag: String },

    /// Set an arbitrary contact field. String values are template-rendered.
    UpdateContactField {
        field: String,
        #[cfg_attr(feature = "openapi", schema(value_type = Object))]
        value: serde_json::Value,
    },

    /// Create an in-app notification for each listed user.
    CreateNotification {
        user_ids: Vec<String>,
        title: String,
        body: String,
    },

    /// Invoke an external HTTP endpoint with a templated JSON body.
    /// A non-2xx response fails the action.
    ExecuteWebhook {
        url: String,
        #[serde(default)]
        method: WebhookMethod,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        #[cfg_attr(feature = "openapi", schema(value_type = Object))]
        body: serde_json::Value,
    },
}

impl ActionConfig {
    /// Short discriminator used in logs and error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpdateConversationStatus { .. } => "update_conversation_status",
            Self::AssignConversation { .. } => "assign_conversation",
            Self::AddTag { .. } => "add_tag",
            Self::RemoveTag { .. } => "remove_tag",
            Self::UpdateContactField { .. } => "update_contact_field",
            Self::CreateNotification { .. } => "create_notification",
            Self::ExecuteWebhook { .. } => "execute_webhook",
        }
    }
}
