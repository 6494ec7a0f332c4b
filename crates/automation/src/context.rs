//! Evaluation context construction.
//!
//! A context is built fresh from storage snapshots for each evaluation and
//! discarded afterwards; it is never shared across concurrent evaluations.

use std::collections::HashMap;

use tracing::warn;

use talaria_core::{Channel, Contact, Conversation, Message};
use talaria_storage::Storage;
use talaria_template::flatten_context;

use crate::error::ExecutionError;

/// How many recent messages are loaded for chatbot prompts and rules.
const MESSAGE_HISTORY_LIMIT: usize = 20;

/// Ephemeral snapshot bag for one automation evaluation.
#[derive(Debug, Clone, Default)]
pub struct AutomationContext {
    pub conversation: Option<Conversation>,
    pub contact: Option<Contact>,
    pub channel: Option<Channel>,
    /// Recent history, newest last.
    pub messages: Vec<Message>,
    pub incoming_message: Option<Message>,
    pub last_message: Option<Message>,
    pub variables: HashMap<String, serde_json::Value>,
}

impl AutomationContext {
    /// Project the context into the flattened JSON shape used by both the
    /// rule engine and the template engine.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        flatten_context(
            self.conversation.as_ref(),
            self.contact.as_ref(),
            self.channel.as_ref(),
            self.incoming_message.as_ref(),
            self.last_message.as_ref(),
            &self.variables,
        )
    }
}

/// Builds contexts from the storage collaborator.
pub struct ContextBuilder<'a> {
    storage: &'a dyn Storage,
}

impl<'a> ContextBuilder<'a> {
    #[must_use]
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Context for an inbound message. The conversation must exist; a
    /// missing channel is tolerated (the channel may have been deleted
    /// after the message arrived).
    pub async fn for_message(
        &self,
        message: &Message,
    ) -> Result<AutomationContext, ExecutionError> {
        let conversation = self
            .storage
            .get_conversation(&message.conversation_id)
            .await?;
        let mut ctx = self.for_loaded_conversation(conversation).await?;
        ctx.incoming_message = Some(message.clone());
        Ok(ctx)
    }

    /// Context for a scheduled run against one conversation.
    pub async fn for_conversation(
        &self,
        conversation_id: &str,
        variables: HashMap<String, serde_json::Value>,
    ) -> Result<AutomationContext, ExecutionError> {
        let conversation = self.storage.get_conversation(conversation_id).await?;
        let mut ctx = self.for_loaded_conversation(conversation).await?;
        ctx.variables = variables;
        Ok(ctx)
    }

    /// Context for a scheduled run against one contact (no conversation).
    pub async fn for_contact(
        &self,
        contact_id: &str,
        variables: HashMap<String, serde_json::Value>,
    ) -> Result<AutomationContext, ExecutionError> {
        let contact = self.storage.get_contact(contact_id).await?;
        Ok(AutomationContext {
            contact: Some(contact),
            variables,
            ..AutomationContext::default()
        })
    }

    async fn for_loaded_conversation(
        &self,
        conversation: Conversation,
    ) -> Result<AutomationContext, ExecutionError> {
        let contact = match self.storage.get_contact(&conversation.contact_id).await {
            Ok(contact) => Some(contact),
            Err(e) => {
                warn!(
                    conversation_id = %conversation.id,
                    contact_id = %conversation.contact_id,
                    error = %e,
                    "contact missing while building context"
                );
                None
            }
        };

        let channel = match &conversation.channel_id {
            Some(channel_id) => match self.storage.get_channel(channel_id).await {
                Ok(channel) => Some(channel),
                Err(e) => {
                    warn!(channel_id = %channel_id, error = %e, "channel missing while building context");
                    None
                }
            },
            None => None,
        };

        let messages = self
            .storage
            .get_messages(&conversation.id, MESSAGE_HISTORY_LIMIT)
            .await?;
        let last_message = messages.last().cloned();

        Ok(AutomationContext {
            conversation: Some(conversation),
            contact,
            channel,
            messages,
            last_message,
            incoming_message: None,
            variables: HashMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use talaria_core::{ConversationStatus, MessageDirection, NewMessage};
    use talaria_storage_memory::MemoryStorage;

    fn seeded_storage() -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage.insert_contact(Contact {
            id: "c1".into(),
            name: "Maria".into(),
            phone: None,
            email: None,
            tags: Vec::new(),
            fields: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        storage.insert_conversation(Conversation {
            id: "conv-1".into(),
            contact_id: "c1".into(),
            channel_id: None,
            status: ConversationStatus::Open,
            assigned_to: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        storage
    }

    fn inbound(content: &str) -> Message {
        Message {
            id: "m1".into(),
            conversation_id: "conv-1".into(),
            direction: MessageDirection::Inbound,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn for_message_loads_snapshots_and_history() {
        let storage = seeded_storage();
        storage
            .create_message(NewMessage::outbound("conv-1", "olá!"))
            .await
            .unwrap();

        let builder = ContextBuilder::new(&storage);
        let ctx = builder.for_message(&inbound("oi")).await.unwrap();

        assert_eq!(ctx.conversation.as_ref().unwrap().id, "conv-1");
        assert_eq!(ctx.contact.as_ref().unwrap().name, "Maria");
        assert_eq!(ctx.messages.len(), 1);
        assert_eq!(ctx.last_message.as_ref().unwrap().content, "olá!");
        assert_eq!(ctx.incoming_message.as_ref().unwrap().content, "oi");

        let value = ctx.to_value();
        assert_eq!(value["contactName"], "Maria");
        assert_eq!(value["message"], "oi");
    }

    #[tokio::test]
    async fn missing_conversation_is_an_error() {
        let storage = MemoryStorage::new();
        let builder = ContextBuilder::new(&storage);
        let result = builder.for_message(&inbound("oi")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_contact_degrades_to_none() {
        let storage = MemoryStorage::new();
        storage.insert_conversation(Conversation {
            id: "conv-1".into(),
            contact_id: "ghost".into(),
            channel_id: None,
            status: ConversationStatus::Open,
            assigned_to: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        let builder = ContextBuilder::new(&storage);
        let ctx = builder.for_message(&inbound("oi")).await.unwrap();
        assert!(ctx.contact.is_none());
    }
}
