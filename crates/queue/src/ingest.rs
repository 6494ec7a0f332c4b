//! Built-in handlers: channel message ingestion and payment callbacks.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use talaria_automation::AutomationService;
use talaria_core::{NewMessage, NewNotification, WebhookQueueItem};
use talaria_storage::Storage;

use crate::handler::{HandlerError, WebhookHandler};

/// Payload shape for channel message webhooks (the default route).
#[derive(Debug, Deserialize)]
struct MessagePayload {
    conversation_id: String,
    content: String,
}

/// Default handler: persists the inbound message and feeds it to the
/// automation service.
///
/// Automation failures are outcomes, not ingestion failures -- they are
/// logged and visible through automation results, while the queue item
/// completes. Only a payload that cannot be ingested at all (bad shape,
/// unknown conversation, storage trouble) fails the item.
pub struct MessageIngestHandler {
    storage: Arc<dyn Storage>,
    service: Arc<AutomationService>,
}

impl MessageIngestHandler {
    pub fn new(storage: Arc<dyn Storage>, service: Arc<AutomationService>) -> Self {
        Self { storage, service }
    }
}

#[async_trait]
impl WebhookHandler for MessageIngestHandler {
    fn name(&self) -> &str {
        "message-ingest"
    }

    #[instrument(skip(self, item), fields(item_id = item.id, source = %item.source))]
    async fn handle(&self, item: &WebhookQueueItem) -> Result<(), HandlerError> {
        let payload: MessagePayload = serde_json::from_value(item.payload.clone())
            .map_err(|e| HandlerError::new(format!("unparseable message payload: {e}")))?;

        // The conversation must exist before we accept the message; the
        // producer may deliver ahead of CRM sync, in which case retrying
        // later is exactly right.
        self.storage.get_conversation(&payload.conversation_id).await?;

        let message = self
            .storage
            .create_message(NewMessage::inbound(
                &payload.conversation_id,
                payload.content,
            ))
            .await?;

        let results = self.service.process_incoming_message(&message).await;
        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            warn!(
                executed = results.len(),
                failed, "some automations failed for ingested message"
            );
        } else {
            debug!(executed = results.len(), "message ingested");
        }
        Ok(())
    }
}

/// Payload shape for payment gateway callbacks.
#[derive(Debug, Deserialize)]
struct PaymentPayload {
    event: String,
    status: String,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    amount: Option<f64>,
}

/// Handler for the `payment` source: notifies operators of gateway events.
///
/// Payment-gateway specifics live with the producer; the engine only turns
/// the callback into an in-app notification trail.
pub struct PaymentWebhookHandler {
    storage: Arc<dyn Storage>,
    /// Users notified about payment events.
    notify_user_ids: Vec<String>,
}

impl PaymentWebhookHandler {
    pub fn new(storage: Arc<dyn Storage>, notify_user_ids: Vec<String>) -> Self {
        Self {
            storage,
            notify_user_ids,
        }
    }
}

#[async_trait]
impl WebhookHandler for PaymentWebhookHandler {
    fn name(&self) -> &str {
        "payment"
    }

    #[instrument(skip(self, item), fields(item_id = item.id))]
    async fn handle(&self, item: &WebhookQueueItem) -> Result<(), HandlerError> {
        let payload: PaymentPayload = serde_json::from_value(item.payload.clone())
            .map_err(|e| HandlerError::new(format!("unparseable payment payload: {e}")))?;

        info!(
            event = %payload.event,
            status = %payload.status,
            "payment webhook received"
        );

        let customer = payload.customer.as_deref().unwrap_or("unknown customer");
        let body = match payload.amount {
            Some(amount) => format!(
                "Payment {} ({}) for {customer}: {amount:.2}",
                payload.event, payload.status
            ),
            None => format!("Payment {} ({}) for {customer}", payload.event, payload.status),
        };

        for user_id in &self.notify_user_ids {
            self.storage
                .create_notification(NewNotification {
                    user_id: user_id.clone(),
                    title: format!("Payment {}", payload.status),
                    body: body.clone(),
                })
                .await?;
        }
        Ok(())
    }
}
