//! Context flattening.
//!
//! Entities are projected into prefixed top-level keys (`contactName`,
//! `contact_<customFieldKey>`, `conversationStatus`, ...) so templates and
//! rules can reference them without deep-path syntax. The nested objects
//! are kept alongside the flat keys, so `{{ contact.email }}` works too.

use std::collections::HashMap;

use serde_json::{Map, Value, json};

use talaria_core::{Channel, Contact, Conversation, Message};

/// Build the flattened evaluation/render context.
#[must_use]
pub fn flatten_context(
    conversation: Option<&Conversation>,
    contact: Option<&Contact>,
    channel: Option<&Channel>,
    incoming_message: Option<&Message>,
    last_message: Option<&Message>,
    variables: &HashMap<String, Value>,
) -> Value {
    let mut ctx = Map::new();

    if let Some(conversation) = conversation {
        ctx.insert("conversationId".into(), json!(conversation.id));
        ctx.insert("conversationStatus".into(), json!(conversation.status));
        if let Some(assigned) = &conversation.assigned_to {
            ctx.insert("assignedTo".into(), json!(assigned));
        }
        ctx.insert(
            "conversation".into(),
            serde_json::to_value(conversation).unwrap_or(Value::Null),
        );
    }

    if let Some(contact) = contact {
        ctx.insert("contactId".into(), json!(contact.id));
        ctx.insert("contactName".into(), json!(contact.name));
        if let Some(phone) = &contact.phone {
            ctx.insert("contactPhone".into(), json!(phone));
        }
        if let Some(email) = &contact.email {
            ctx.insert("contactEmail".into(), json!(email));
        }
        ctx.insert("contactTags".into(), json!(contact.tags));
        for (key, value) in &contact.fields {
            ctx.insert(format!("contact_{key}"), value.clone());
        }
        ctx.insert(
            "contact".into(),
            serde_json::to_value(contact).unwrap_or(Value::Null),
        );
    }

    if let Some(channel) = channel {
        ctx.insert("channelId".into(), json!(channel.id));
        ctx.insert("channelName".into(), json!(channel.name));
        ctx.insert("channelType".into(), json!(channel.channel_type));
        ctx.insert(
            "channel".into(),
            serde_json::to_value(channel).unwrap_or(Value::Null),
        );
    }

    if let Some(message) = incoming_message {
        ctx.insert("message".into(), json!(message.content));
        ctx.insert("messageId".into(), json!(message.id));
        ctx.insert(
            "incomingMessage".into(),
            serde_json::to_value(message).unwrap_or(Value::Null),
        );
    }

    if let Some(message) = last_message {
        ctx.insert("lastMessage".into(), json!(message.content));
    }

    // Free-form variables win over entity projections.
    for (key, value) in variables {
        ctx.insert(key.clone(), value.clone());
    }

    Value::Object(ctx)
}
