//! The automation service: decides which automations fire for an inbound
//! message or a schedule tick, and runs them through the executor.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use talaria_core::{
    AutomationResult, AutomationType, ConversationStatus, Message, ScheduleConfig, ScheduleTarget,
};
use talaria_rules::schedule_is_due;
use talaria_storage::{ConversationFilter, Storage};

use crate::context::{AutomationContext, ContextBuilder};
use crate::error::ExecutionError;
use crate::executor::AutomationExecutor;

/// Orchestrates per-message and per-schedule automation evaluation.
pub struct AutomationService {
    storage: Arc<dyn Storage>,
    executor: AutomationExecutor,
}

impl AutomationService {
    pub fn new(storage: Arc<dyn Storage>, executor: AutomationExecutor) -> Self {
        Self { storage, executor }
    }

    /// Run every eligible message-driven automation for an inbound message.
    ///
    /// Non-inbound messages are a no-op. Failures are contained per
    /// automation: one automation's failure never stops its siblings, and a
    /// context that cannot be built fails closed with a single failed
    /// result instead of throwing past the caller.
    #[instrument(skip(self, message), fields(message_id = %message.id, conversation_id = %message.conversation_id))]
    pub async fn process_incoming_message(&self, message: &Message) -> Vec<AutomationResult> {
        if !message.is_inbound() {
            return Vec::new();
        }

        let builder = ContextBuilder::new(self.storage.as_ref());
        let ctx = match builder.for_message(message).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %e, "failed to build context for inbound message");
                return vec![AutomationResult::failed(format!(
                    "failed to build message context: {e}"
                ))];
            }
        };

        let automations = match self.storage.get_automations(None).await {
            Ok(automations) => automations,
            Err(e) => {
                warn!(error = %e, "failed to load automations");
                return vec![AutomationResult::failed(format!(
                    "failed to load automations: {e}"
                ))];
            }
        };

        // Storage returns automations ordered by id, so evaluation order is
        // deterministic across runs.
        let mut results = Vec::new();
        for automation in automations.iter().filter(|a| a.is_message_eligible()) {
            self.touch_last_executed(&automation.id).await;
            if let Some(result) = self.executor.execute(automation, &ctx).await {
                debug!(
                    automation_id = %automation.id,
                    success = result.success,
                    "automation executed for message"
                );
                results.push(result);
            }
        }
        results
    }

    /// Run every active scheduled automation whose schedule is due now.
    ///
    /// An automation whose target context cannot be built is skipped with a
    /// warning; it does not fail the batch.
    #[instrument(skip(self))]
    pub async fn process_scheduled_automations(&self) -> Vec<AutomationResult> {
        let automations = match self
            .storage
            .get_automations(Some(AutomationType::Scheduled))
            .await
        {
            Ok(automations) => automations,
            Err(e) => {
                warn!(error = %e, "failed to load scheduled automations");
                return vec![AutomationResult::failed(format!(
                    "failed to load scheduled automations: {e}"
                ))];
            }
        };

        let now = Utc::now();
        let mut results = Vec::new();

        for automation in automations
            .iter()
            .filter(|a| a.is_active && schedule_is_due(a, now))
        {
            let Some(schedule) = &automation.schedule else {
                warn!(automation_id = %automation.id, "scheduled automation without schedule config");
                continue;
            };

            let contexts = match self.build_schedule_contexts(schedule).await {
                Ok(contexts) => contexts,
                Err(e) => {
                    warn!(
                        automation_id = %automation.id,
                        error = %e,
                        "skipping scheduled automation, target context unavailable"
                    );
                    continue;
                }
            };

            // Mark the attempt before dispatch so the schedule cannot
            // re-fire inside the same due window.
            self.touch_last_executed(&automation.id).await;

            for ctx in contexts {
                if let Some(result) = self.executor.execute(automation, &ctx).await {
                    results.push(result);
                }
            }
        }
        results
    }

    /// Force-run one automation by id (the manual execute endpoint).
    ///
    /// Returns `Ok(None)` when the automation exists but did not match the
    /// context it was given.
    pub async fn execute_automation(
        &self,
        id: &str,
    ) -> Result<Option<AutomationResult>, ExecutionError> {
        let automation = self.storage.get_automation(id).await?;
        let ctx = match &automation.schedule {
            Some(schedule) => self
                .build_schedule_contexts(schedule)
                .await?
                .into_iter()
                .next()
                .unwrap_or_default(),
            None => AutomationContext::default(),
        };
        self.touch_last_executed(&automation.id).await;
        Ok(self.executor.execute(&automation, &ctx).await)
    }

    async fn build_schedule_contexts(
        &self,
        schedule: &ScheduleConfig,
    ) -> Result<Vec<AutomationContext>, ExecutionError> {
        let builder = ContextBuilder::new(self.storage.as_ref());
        match schedule.target {
            ScheduleTarget::Conversation => {
                let target_id = required_target(schedule)?;
                let ctx = builder
                    .for_conversation(target_id, schedule.variables.clone())
                    .await?;
                Ok(vec![ctx])
            }
            ScheduleTarget::Contact => {
                let target_id = required_target(schedule)?;
                let ctx = builder
                    .for_contact(target_id, schedule.variables.clone())
                    .await?;
                Ok(vec![ctx])
            }
            ScheduleTarget::All => {
                let conversations = self
                    .storage
                    .list_conversations(ConversationFilter {
                        status: Some(ConversationStatus::Open),
                        ..ConversationFilter::default()
                    })
                    .await?;
                let mut contexts = Vec::with_capacity(conversations.len());
                for conversation in conversations {
                    match builder
                        .for_conversation(&conversation.id, schedule.variables.clone())
                        .await
                    {
                        Ok(ctx) => contexts.push(ctx),
                        Err(e) => {
                            warn!(
                                conversation_id = %conversation.id,
                                error = %e,
                                "skipping conversation in scheduled batch"
                            );
                        }
                    }
                }
                Ok(contexts)
            }
        }
    }

    async fn touch_last_executed(&self, id: &str) {
        if let Err(e) = self.storage.set_automation_last_executed(id, Utc::now()).await {
            warn!(automation_id = %id, error = %e, "failed to record execution attempt");
        }
    }
}

fn required_target(schedule: &ScheduleConfig) -> Result<&str, ExecutionError> {
    schedule
        .target_id
        .as_deref()
        .ok_or_else(|| ExecutionError::InvalidConfig("schedule target without target_id".into()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::actions::{ActionRunner, WebhookOptions};
    use talaria_ai::FailingAiResponder;
    use talaria_core::{
        ActionConfig, Automation, Contact, Conversation, Message, MessageDirection,
        ResponseTemplate, ScheduleCadence, TriggerConfig,
    };
    use talaria_template::TemplateEngine;
    use talaria_storage_memory::MemoryStorage;

    fn seeded() -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
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
            status: talaria_core::ConversationStatus::Open,
            assigned_to: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        storage
    }

    fn service(storage: Arc<MemoryStorage>) -> AutomationService {
        let templates = Arc::new(TemplateEngine::new());
        let actions = ActionRunner::new(
            Arc::clone(&storage) as Arc<dyn Storage>,
            Arc::clone(&templates),
            WebhookOptions::default(),
        )
        .unwrap();
        let executor = AutomationExecutor::new(
            Arc::clone(&storage) as Arc<dyn Storage>,
            templates,
            actions,
        )
        .with_ai(Arc::new(FailingAiResponder::new("no provider in tests")));
        AutomationService::new(storage, executor)
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
    async fn outbound_messages_are_a_noop() {
        let storage = seeded();
        let service = service(storage);
        let message = Message {
            direction: MessageDirection::Outbound,
            ..inbound("ignored")
        };
        assert!(service.process_incoming_message(&message).await.is_empty());
    }

    #[tokio::test]
    async fn missing_conversation_fails_closed() {
        let storage = Arc::new(MemoryStorage::new());
        let service = service(storage);
        let results = service.process_incoming_message(&inbound("oi")).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
    }

    #[tokio::test]
    async fn sibling_failure_does_not_stop_other_automations() {
        let storage = seeded();

        // A chatbot that will fail (failing AI) ordered before a quick
        // reply that succeeds.
        let mut failing = Automation::new("a-bot", AutomationType::Chatbot)
            .active()
            .with_response(ResponseTemplate::Prompt { prompt: "p".into() });
        failing.id = "a-bot".into();
        let mut quick = Automation::new("b-quick", AutomationType::QuickReply)
            .active()
            .with_trigger(TriggerConfig {
                keywords: vec!["valor".into()],
                ..TriggerConfig::default()
            })
            .with_response(ResponseTemplate::Text("Planos a partir de R$49".into()));
        quick.id = "b-quick".into();

        storage.create_automation(failing).await.unwrap();
        storage.create_automation(quick).await.unwrap();

        let service = service(Arc::clone(&storage));
        let results = service
            .process_incoming_message(&inbound("qual o valor?"))
            .await;

        assert_eq!(results.len(), 2);
        assert!(!results[0].success, "chatbot fails via failing AI");
        assert!(results[1].success, "quick reply still runs");

        // Both dispatches were recorded.
        assert!(
            storage
                .get_automation("a-bot")
                .await
                .unwrap()
                .last_executed_at
                .is_some()
        );
        assert!(
            storage
                .get_automation("b-quick")
                .await
                .unwrap()
                .last_executed_at
                .is_some()
        );
    }

    #[tokio::test]
    async fn scheduled_automation_runs_once_per_due_window() {
        let storage = seeded();
        let automation = Automation::new("tagger", AutomationType::Scheduled)
            .active()
            .with_schedule(ScheduleConfig {
                target: ScheduleTarget::Conversation,
                target_id: Some("conv-1".into()),
                cadence: ScheduleCadence::Interval { minutes: 60 },
                variables: HashMap::new(),
                actions: vec![ActionConfig::AddTag { tag: "scheduled".into() }],
            });
        let id = automation.id.clone();
        storage.create_automation(automation).await.unwrap();

        let service = service(Arc::clone(&storage));

        let first = service.process_scheduled_automations().await;
        assert_eq!(first.len(), 1);
        assert!(first[0].success);

        // Second call inside the same window: nothing is due.
        let second = service.process_scheduled_automations().await;
        assert!(second.is_empty());

        assert!(
            storage
                .get_automation(&id)
                .await
                .unwrap()
                .last_executed_at
                .is_some()
        );
    }

    #[tokio::test]
    async fn scheduled_automation_with_missing_target_is_skipped() {
        let storage = seeded();
        let automation = Automation::new("orphan", AutomationType::Scheduled)
            .active()
            .with_schedule(ScheduleConfig {
                target: ScheduleTarget::Conversation,
                target_id: Some("deleted-conv".into()),
                cadence: ScheduleCadence::Interval { minutes: 60 },
                variables: HashMap::new(),
                actions: Vec::new(),
            });
        storage.create_automation(automation).await.unwrap();

        let service = service(storage);
        let results = service.process_scheduled_automations().await;
        assert!(results.is_empty(), "a missing target is a skip, not a failure");
    }

    #[tokio::test]
    async fn scheduled_variables_reach_the_template() {
        let storage = seeded();
        let mut variables = HashMap::new();
        variables.insert("promo".to_owned(), json!("FRETE10"));
        let automation = Automation::new("promo", AutomationType::Scheduled)
            .active()
            .with_schedule(ScheduleConfig {
                target: ScheduleTarget::Conversation,
                target_id: Some("conv-1".into()),
                cadence: ScheduleCadence::Interval { minutes: 60 },
                variables,
                actions: Vec::new(),
            })
            .with_response(ResponseTemplate::Text(
                "Use o cupom {{ promo }}, {{ contactName }}!".into(),
            ));
        storage.create_automation(automation).await.unwrap();

        let service = service(storage);
        let results = service.process_scheduled_automations().await;
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].response.as_deref(),
            Some("Use o cupom FRETE10, Maria!")
        );
    }

    #[tokio::test]
    async fn execute_automation_surfaces_not_found() {
        let storage = seeded();
        let service = service(storage);
        let result = service.execute_automation("missing").await;
        assert!(matches!(result, Err(ExecutionError::Storage(_))));
    }
}
