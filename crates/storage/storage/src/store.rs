use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use talaria_core::{
    Automation, AutomationType, Channel, Contact, Conversation, ConversationStatus, Message,
    NewMessage, NewNotification, ResponseTemplate, ScheduleConfig, TriggerConfig,
};

use crate::error::StorageError;

/// Partial update of an automation. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationUpdate {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub trigger: Option<TriggerConfig>,
    pub schedule: Option<ScheduleConfig>,
    pub response: Option<ResponseTemplate>,
    pub model_provider: Option<String>,
    pub model_config: Option<serde_json::Value>,
}

/// Partial update of a contact.
///
/// `tags` replaces the whole tag list (callers compute the new set);
/// `fields` merges key by key.
#[derive(Debug, Clone, Default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub fields: HashMap<String, serde_json::Value>,
}

/// Filter for listing conversations.
#[derive(Debug, Clone, Default)]
pub struct ConversationFilter {
    pub status: Option<ConversationStatus>,
    pub contact_id: Option<String>,
    pub channel_id: Option<String>,
}

/// The CRM storage collaborator.
///
/// Every method is asynchronous and may fail with a backend error; callers
/// on the automation path treat those as automation failures, never as
/// process-fatal. Implementations must be safe for concurrent access.
#[async_trait]
pub trait Storage: Send + Sync {
    // -- Automations ------------------------------------------------------

    /// List automations, optionally restricted to one type.
    async fn get_automations(
        &self,
        automation_type: Option<AutomationType>,
    ) -> Result<Vec<Automation>, StorageError>;

    async fn get_automation(&self, id: &str) -> Result<Automation, StorageError>;

    async fn create_automation(&self, automation: Automation) -> Result<Automation, StorageError>;

    async fn update_automation(
        &self,
        id: &str,
        update: AutomationUpdate,
    ) -> Result<Automation, StorageError>;

    async fn delete_automation(&self, id: &str) -> Result<(), StorageError>;

    /// Record an execution attempt. Called before dispatch, for successes
    /// and failures alike.
    async fn set_automation_last_executed(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    // -- Conversations ----------------------------------------------------

    async fn get_conversation(&self, id: &str) -> Result<Conversation, StorageError>;

    async fn list_conversations(
        &self,
        filter: ConversationFilter,
    ) -> Result<Vec<Conversation>, StorageError>;

    async fn update_conversation_status(
        &self,
        id: &str,
        status: ConversationStatus,
    ) -> Result<(), StorageError>;

    async fn assign_conversation(&self, id: &str, user_id: &str) -> Result<(), StorageError>;

    // -- Contacts ---------------------------------------------------------

    async fn get_contact(&self, id: &str) -> Result<Contact, StorageError>;

    async fn update_contact(
        &self,
        id: &str,
        update: ContactUpdate,
    ) -> Result<Contact, StorageError>;

    // -- Channels ---------------------------------------------------------

    async fn get_channel(&self, id: &str) -> Result<Channel, StorageError>;

    // -- Messages ---------------------------------------------------------

    /// Most recent messages for a conversation, newest last, at most `limit`.
    async fn get_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StorageError>;

    async fn create_message(&self, message: NewMessage) -> Result<Message, StorageError>;

    // -- Notifications ----------------------------------------------------

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<(), StorageError>;
}
