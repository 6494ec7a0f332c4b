use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use talaria_core::{
    Automation, AutomationType, Channel, Contact, Conversation, ConversationStatus, Message,
    NewMessage, NewNotification,
};
use talaria_storage::{
    AutomationUpdate, ContactUpdate, ConversationFilter, Storage, StorageError,
};

/// In-memory [`Storage`] backed by [`DashMap`]s.
///
/// Ships with the engine for tests and single-process deployments; any
/// other backend implements the same trait against its own engine.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    automations: DashMap<String, Automation>,
    conversations: DashMap<String, Conversation>,
    contacts: DashMap<String, Contact>,
    channels: DashMap<String, Channel>,
    messages: DashMap<String, Vec<Message>>,
    notifications: Mutex<Vec<NewNotification>>,
}

impl MemoryStorage {
    /// Create a new, empty in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a conversation (test/bootstrap helper, not part of [`Storage`]).
    pub fn insert_conversation(&self, conversation: Conversation) {
        self.conversations
            .insert(conversation.id.clone(), conversation);
    }

    /// Seed a contact.
    pub fn insert_contact(&self, contact: Contact) {
        self.contacts.insert(contact.id.clone(), contact);
    }

    /// Seed a channel.
    pub fn insert_channel(&self, channel: Channel) {
        self.channels.insert(channel.id.clone(), channel);
    }

    /// Snapshot of every notification created so far.
    pub fn notifications(&self) -> Vec<NewNotification> {
        self.notifications
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

fn not_found(kind: &str, id: &str) -> StorageError {
    StorageError::NotFound(format!("{kind} {id}"))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_automations(
        &self,
        automation_type: Option<AutomationType>,
    ) -> Result<Vec<Automation>, StorageError> {
        let mut automations: Vec<Automation> = self
            .automations
            .iter()
            .filter(|entry| {
                automation_type.is_none_or(|wanted| entry.automation_type == wanted)
            })
            .map(|entry| entry.clone())
            .collect();
        // Deterministic evaluation order for the service.
        automations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(automations)
    }

    async fn get_automation(&self, id: &str) -> Result<Automation, StorageError> {
        self.automations
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| not_found("automation", id))
    }

    async fn create_automation(&self, automation: Automation) -> Result<Automation, StorageError> {
        self.automations
            .insert(automation.id.clone(), automation.clone());
        Ok(automation)
    }

    async fn update_automation(
        &self,
        id: &str,
        update: AutomationUpdate,
    ) -> Result<Automation, StorageError> {
        let mut entry = self
            .automations
            .get_mut(id)
            .ok_or_else(|| not_found("automation", id))?;
        if let Some(name) = update.name {
            entry.name = name;
        }
        if let Some(is_active) = update.is_active {
            entry.is_active = is_active;
        }
        if let Some(trigger) = update.trigger {
            entry.trigger = trigger;
        }
        if let Some(schedule) = update.schedule {
            entry.schedule = Some(schedule);
        }
        if let Some(response) = update.response {
            entry.response = Some(response);
        }
        if let Some(model_provider) = update.model_provider {
            entry.model_provider = Some(model_provider);
        }
        if let Some(model_config) = update.model_config {
            entry.model_config = Some(model_config);
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete_automation(&self, id: &str) -> Result<(), StorageError> {
        self.automations
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("automation", id))
    }

    async fn set_automation_last_executed(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut entry = self
            .automations
            .get_mut(id)
            .ok_or_else(|| not_found("automation", id))?;
        entry.last_executed_at = Some(at);
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Conversation, StorageError> {
        self.conversations
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| not_found("conversation", id))
    }

    async fn list_conversations(
        &self,
        filter: ConversationFilter,
    ) -> Result<Vec<Conversation>, StorageError> {
        let mut conversations: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|entry| {
                filter.status.is_none_or(|status| entry.status == status)
                    && filter
                        .contact_id
                        .as_ref()
                        .is_none_or(|id| &entry.contact_id == id)
                    && filter
                        .channel_id
                        .as_ref()
                        .is_none_or(|id| entry.channel_id.as_ref() == Some(id))
            })
            .map(|entry| entry.clone())
            .collect();
        conversations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(conversations)
    }

    async fn update_conversation_status(
        &self,
        id: &str,
        status: ConversationStatus,
    ) -> Result<(), StorageError> {
        let mut entry = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| not_found("conversation", id))?;
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn assign_conversation(&self, id: &str, user_id: &str) -> Result<(), StorageError> {
        let mut entry = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| not_found("conversation", id))?;
        entry.assigned_to = Some(user_id.to_owned());
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn get_contact(&self, id: &str) -> Result<Contact, StorageError> {
        self.contacts
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| not_found("contact", id))
    }

    async fn update_contact(
        &self,
        id: &str,
        update: ContactUpdate,
    ) -> Result<Contact, StorageError> {
        let mut entry = self
            .contacts
            .get_mut(id)
            .ok_or_else(|| not_found("contact", id))?;
        if let Some(name) = update.name {
            entry.name = name;
        }
        if let Some(tags) = update.tags {
            entry.tags = tags;
        }
        for (key, value) in update.fields {
            entry.fields.insert(key, value);
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn get_channel(&self, id: &str) -> Result<Channel, StorageError> {
        self.channels
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| not_found("channel", id))
    }

    async fn get_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StorageError> {
        let messages = self
            .messages
            .get(conversation_id)
            .map(|entry| entry.clone())
            .unwrap_or_default();
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.into_iter().skip(skip).collect())
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, StorageError> {
        let stored = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: message.conversation_id.clone(),
            direction: message.direction,
            content: message.content,
            created_at: Utc::now(),
        };
        self.messages
            .entry(message.conversation_id)
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<(), StorageError> {
        self.notifications
            .lock()
            .map_err(|_| StorageError::Backend("notification lock poisoned".into()))?
            .push(notification);
        Ok(())
    }
}
