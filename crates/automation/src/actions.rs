//! Execution of automation action lists.
//!
//! Actions run strictly in order; the first failure aborts the remainder of
//! the list and surfaces as the automation's failure. Tag actions are
//! idempotent against the *current* contact record, not the context
//! snapshot, so repeating them never duplicates state.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, instrument};

use talaria_core::{ActionConfig, ConversationStatus, NewNotification, WebhookMethod};
use talaria_storage::{ContactUpdate, Storage};
use talaria_template::TemplateEngine;

use crate::context::AutomationContext;
use crate::error::ExecutionError;

type HmacSha256 = Hmac<Sha256>;

/// Signature header set on outbound webhook calls when a secret is
/// configured.
const SIGNATURE_HEADER: &str = "X-Talaria-Signature";

/// Options for outbound webhook calls made by `execute_webhook` actions.
#[derive(Debug, Clone)]
pub struct WebhookOptions {
    /// Bound on the whole HTTP call; a timeout fails the action.
    pub timeout: Duration,
    /// When set, request bodies are HMAC-SHA256 signed.
    pub signing_secret: Option<String>,
}

impl Default for WebhookOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            signing_secret: None,
        }
    }
}

/// Runs the side-effecting steps of trigger/scheduled automations.
pub struct ActionRunner {
    storage: Arc<dyn Storage>,
    templates: Arc<TemplateEngine>,
    client: reqwest::Client,
    signing_secret: Option<String>,
}

impl ActionRunner {
    /// Create a runner. The HTTP client carries the configured timeout so
    /// no webhook action can block an automation indefinitely.
    pub fn new(
        storage: Arc<dyn Storage>,
        templates: Arc<TemplateEngine>,
        options: WebhookOptions,
    ) -> Result<Self, ExecutionError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| ExecutionError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            storage,
            templates,
            client,
            signing_secret: options.signing_secret,
        })
    }

    /// Run all actions in order. The first failure aborts the rest.
    pub async fn run_all(
        &self,
        actions: &[ActionConfig],
        ctx: &AutomationContext,
    ) -> Result<(), ExecutionError> {
        let ctx_value = ctx.to_value();
        for action in actions {
            self.run(action, ctx, &ctx_value)
                .await
                .map_err(|e| match e {
                    already @ ExecutionError::Action { .. } => already,
                    other => ExecutionError::Action {
                        kind: action.kind(),
                        reason: other.to_string(),
                    },
                })?;
        }
        Ok(())
    }

    #[instrument(skip(self, action, ctx, ctx_value), fields(action = action.kind()))]
    async fn run(
        &self,
        action: &ActionConfig,
        ctx: &AutomationContext,
        ctx_value: &serde_json::Value,
    ) -> Result<(), ExecutionError> {
        match action {
            ActionConfig::UpdateConversationStatus { status } => {
                let conversation_id = required_conversation(ctx)?;
                let status = ConversationStatus::parse(status).ok_or_else(|| {
                    ExecutionError::InvalidConfig(format!("unknown conversation status '{status}'"))
                })?;
                self.storage
                    .update_conversation_status(conversation_id, status)
                    .await?;
            }

            ActionConfig::AssignConversation { user_id } => {
                let conversation_id = required_conversation(ctx)?;
                self.storage
                    .assign_conversation(conversation_id, user_id)
                    .await?;
            }

            ActionConfig::AddTag { tag } => {
                let contact_id = required_contact(ctx)?;
                // Read the live record so repeated adds stay idempotent.
                let contact = self.storage.get_contact(contact_id).await?;
                if !contact.has_tag(tag) {
                    let mut tags = contact.tags;
                    tags.push(tag.clone());
                    self.storage
                        .update_contact(
                            contact_id,
                            ContactUpdate {
                                tags: Some(tags),
                                ..ContactUpdate::default()
                            },
                        )
                        .await?;
                }
            }

            ActionConfig::RemoveTag { tag } => {
                let contact_id = required_contact(ctx)?;
                let contact = self.storage.get_contact(contact_id).await?;
                if contact.has_tag(tag) {
                    let tags = contact.tags.into_iter().filter(|t| t != tag).collect();
                    self.storage
                        .update_contact(
                            contact_id,
                            ContactUpdate {
                                tags: Some(tags),
                                ..ContactUpdate::default()
                            },
                        )
                        .await?;
                }
            }

            ActionConfig::UpdateContactField { field, value } => {
                let contact_id = required_contact(ctx)?;
                let value = match value {
                    serde_json::Value::String(template) => {
                        serde_json::Value::String(self.templates.render_text(template, ctx_value))
                    }
                    other => other.clone(),
                };
                let mut update = ContactUpdate::default();
                update.fields.insert(field.clone(), value);
                self.storage.update_contact(contact_id, update).await?;
            }

            ActionConfig::CreateNotification {
                user_ids,
                title,
                body,
            } => {
                let title = self.templates.render_text(title, ctx_value);
                let body = self.templates.render_text(body, ctx_value);
                for user_id in user_ids {
                    self.storage
                        .create_notification(NewNotification {
                            user_id: user_id.clone(),
                            title: title.clone(),
                            body: body.clone(),
                        })
                        .await?;
                }
            }

            ActionConfig::ExecuteWebhook {
                url,
                method,
                headers,
                body,
            } => {
                self.execute_webhook(url, *method, headers, body, ctx_value)
                    .await?;
            }
        }
        Ok(())
    }

    async fn execute_webhook(
        &self,
        url: &str,
        method: WebhookMethod,
        headers: &std::collections::HashMap<String, String>,
        body: &serde_json::Value,
        ctx_value: &serde_json::Value,
    ) -> Result<(), ExecutionError> {
        let url = self.templates.render_text(url, ctx_value);
        let body = self.templates.render_json(body, ctx_value);
        let body_bytes =
            serde_json::to_vec(&body).map_err(|e| ExecutionError::Http(e.to_string()))?;

        debug!(method = ?method, url = %url, "executing webhook action");

        let mut request = match method {
            WebhookMethod::Get => self.client.get(&url),
            WebhookMethod::Post => self.client.post(&url),
            WebhookMethod::Put => self.client.put(&url),
            WebhookMethod::Patch => self.client.patch(&url),
            WebhookMethod::Delete => self.client.delete(&url),
        };

        request = request
            .header("Content-Type", "application/json")
            .body(body_bytes.clone());

        for (name, value) in headers {
            request = request.header(name, self.templates.render_text(value, ctx_value));
        }

        if let Some(secret) = &self.signing_secret {
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                .map_err(|e| ExecutionError::InvalidConfig(format!("invalid HMAC key: {e}")))?;
            mac.update(&body_bytes);
            let signature = hex::encode(mac.finalize().into_bytes());
            request = request.header(SIGNATURE_HEADER, format!("sha256={signature}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExecutionError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::WebhookStatus {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

fn required_conversation(ctx: &AutomationContext) -> Result<&str, ExecutionError> {
    ctx.conversation
        .as_ref()
        .map(|c| c.id.as_str())
        .ok_or_else(|| ExecutionError::InvalidConfig("no conversation in context".into()))
}

fn required_contact(ctx: &AutomationContext) -> Result<&str, ExecutionError> {
    ctx.contact
        .as_ref()
        .map(|c| c.id.as_str())
        .or_else(|| ctx.conversation.as_ref().map(|c| c.contact_id.as_str()))
        .ok_or_else(|| ExecutionError::InvalidConfig("no contact in context".into()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::*;
    use talaria_core::{Contact, Conversation, ConversationStatus};
    use talaria_storage_memory::MemoryStorage;

    fn runner(storage: Arc<MemoryStorage>) -> ActionRunner {
        ActionRunner::new(
            storage,
            Arc::new(TemplateEngine::new()),
            WebhookOptions::default(),
        )
        .unwrap()
    }

    fn seeded() -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_contact(Contact {
            id: "c1".into(),
            name: "Maria".into(),
            phone: None,
            email: None,
            tags: vec!["lead".into()],
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

    async fn context(storage: &MemoryStorage) -> AutomationContext {
        crate::context::ContextBuilder::new(storage)
            .for_conversation("conv-1", HashMap::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn add_tag_twice_keeps_one_copy() {
        let storage = seeded();
        let runner = runner(Arc::clone(&storage));
        let ctx = context(&storage).await;

        let action = ActionConfig::AddTag { tag: "vip".into() };
        runner.run_all(std::slice::from_ref(&action), &ctx).await.unwrap();
        runner.run_all(std::slice::from_ref(&action), &ctx).await.unwrap();

        let contact = storage.get_contact("c1").await.unwrap();
        assert_eq!(
            contact.tags.iter().filter(|t| t.as_str() == "vip").count(),
            1
        );
    }

    #[tokio::test]
    async fn remove_absent_tag_is_a_noop() {
        let storage = seeded();
        let runner = runner(Arc::clone(&storage));
        let ctx = context(&storage).await;

        runner
            .run_all(&[ActionConfig::RemoveTag { tag: "ghost".into() }], &ctx)
            .await
            .unwrap();

        let contact = storage.get_contact("c1").await.unwrap();
        assert_eq!(contact.tags, vec!["lead".to_owned()]);
    }

    #[tokio::test]
    async fn update_contact_field_renders_string_values() {
        let storage = seeded();
        let runner = runner(Arc::clone(&storage));
        let ctx = context(&storage).await;

        runner
            .run_all(
                &[ActionConfig::UpdateContactField {
                    field: "greeting".into(),
                    value: serde_json::json!("Olá {{ contactName }}"),
                }],
                &ctx,
            )
            .await
            .unwrap();

        let contact = storage.get_contact("c1").await.unwrap();
        assert_eq!(contact.fields["greeting"], "Olá Maria");
    }

    #[tokio::test]
    async fn first_failure_aborts_the_rest() {
        let storage = seeded();
        let runner = runner(Arc::clone(&storage));
        let ctx = context(&storage).await;

        let result = runner
            .run_all(
                &[
                    ActionConfig::UpdateConversationStatus {
                        status: "not-a-status".into(),
                    },
                    ActionConfig::AddTag { tag: "vip".into() },
                ],
                &ctx,
            )
            .await;

        assert!(matches!(
            result,
            Err(ExecutionError::Action {
                kind: "update_conversation_status",
                ..
            })
        ));
        let contact = storage.get_contact("c1").await.unwrap();
        assert!(!contact.has_tag("vip"), "later actions must not run");
    }

    #[tokio::test]
    async fn status_and_assignment_actions_mutate_conversation() {
        let storage = seeded();
        let runner = runner(Arc::clone(&storage));
        let ctx = context(&storage).await;

        runner
            .run_all(
                &[
                    ActionConfig::UpdateConversationStatus {
                        status: "resolved".into(),
                    },
                    ActionConfig::AssignConversation {
                        user_id: "agent-7".into(),
                    },
                ],
                &ctx,
            )
            .await
            .unwrap();

        let conversation = storage.get_conversation("conv-1").await.unwrap();
        assert_eq!(conversation.status, ConversationStatus::Resolved);
        assert_eq!(conversation.assigned_to.as_deref(), Some("agent-7"));
    }

    #[tokio::test]
    async fn notifications_render_templates_per_user() {
        let storage = seeded();
        let runner = runner(Arc::clone(&storage));
        let ctx = context(&storage).await;

        runner
            .run_all(
                &[ActionConfig::CreateNotification {
                    user_ids: vec!["u1".into(), "u2".into()],
                    title: "Follow up {{ contactName }}".into(),
                    body: "Conversation {{ conversationId }} needs attention".into(),
                }],
                &ctx,
            )
            .await
            .unwrap();

        let notifications = storage.notifications();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].title, "Follow up Maria");
        assert!(notifications[1].body.contains("conv-1"));
    }
}
