//! The automation executor: one automation + one context in, one result out.
//!
//! Each automation type maps to one strategy. Strategies return
//! `Ok(None)` when the automation is not eligible for this context (keyword
//! miss, rules unsatisfied), `Ok(Some(result))` when it ran, and `Err` for
//! pipeline failures -- which [`AutomationExecutor::execute`] converts into a
//! failed result, so no error ever crosses the executor boundary.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use talaria_ai::AiResponder;
use talaria_core::{
    Automation, AutomationResult, AutomationType, Message, NewMessage, ResponseTemplate,
};
use talaria_rules::evaluate_rules;
use talaria_storage::Storage;
use talaria_template::TemplateEngine;

use crate::actions::ActionRunner;
use crate::context::AutomationContext;
use crate::error::ExecutionError;
use crate::forward::OutboundForwarder;

/// Dispatches automations to their type-specific strategy.
pub struct AutomationExecutor {
    storage: Arc<dyn Storage>,
    templates: Arc<TemplateEngine>,
    actions: ActionRunner,
    ai: Option<Arc<dyn AiResponder>>,
    forwarder: Option<Arc<dyn OutboundForwarder>>,
}

impl AutomationExecutor {
    pub fn new(
        storage: Arc<dyn Storage>,
        templates: Arc<TemplateEngine>,
        actions: ActionRunner,
    ) -> Self {
        Self {
            storage,
            templates,
            actions,
            ai: None,
            forwarder: None,
        }
    }

    /// Plug in the AI collaborator for chatbot automations.
    #[must_use]
    pub fn with_ai(mut self, ai: Arc<dyn AiResponder>) -> Self {
        self.ai = Some(ai);
        self
    }

    /// Plug in the channel delivery seam for outbound messages.
    #[must_use]
    pub fn with_forwarder(mut self, forwarder: Arc<dyn OutboundForwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Run one automation against one context.
    ///
    /// Returns `None` when the automation did not match this context.
    /// Never returns an error: collaborator failures come back as
    /// `Some(result)` with `success == false`.
    #[instrument(skip(self, automation, ctx), fields(automation_id = %automation.id, automation_type = ?automation.automation_type))]
    pub async fn execute(
        &self,
        automation: &Automation,
        ctx: &AutomationContext,
    ) -> Option<AutomationResult> {
        let outcome = match automation.automation_type {
            AutomationType::QuickReply => self.run_quick_reply(automation, ctx).await,
            AutomationType::Chatbot => self.run_chatbot(automation, ctx).await,
            AutomationType::Trigger => self.run_trigger(automation, ctx).await,
            AutomationType::Scheduled => self.run_scheduled(automation, ctx).await,
        };

        match outcome {
            Ok(Some(result)) => Some(result),
            Ok(None) => {
                debug!("automation did not match");
                None
            }
            Err(e) => {
                warn!(error = %e, "automation execution failed");
                Some(AutomationResult::failed(e.to_string()))
            }
        }
    }

    async fn run_quick_reply(
        &self,
        automation: &Automation,
        ctx: &AutomationContext,
    ) -> Result<Option<AutomationResult>, ExecutionError> {
        let Some(incoming) = &ctx.incoming_message else {
            return Ok(None);
        };
        let content = incoming.content.to_lowercase();
        let matched = automation
            .trigger
            .keywords
            .iter()
            .any(|keyword| content.contains(&keyword.to_lowercase()));
        if !matched {
            return Ok(None);
        }

        let template = response_template(automation)?;
        let rendered = self.templates.render_text(template, &ctx.to_value());
        let message = self.send_reply(ctx, &rendered).await?;
        Ok(Some(AutomationResult::replied(rendered, message)))
    }

    async fn run_chatbot(
        &self,
        automation: &Automation,
        ctx: &AutomationContext,
    ) -> Result<Option<AutomationResult>, ExecutionError> {
        let ctx_value = ctx.to_value();
        // A chatbot with no extra rules is always eligible.
        if !automation.trigger.rules.is_empty()
            && !evaluate_rules(
                &automation.trigger.rules,
                automation.trigger.combinator,
                &ctx_value,
            )
        {
            return Ok(None);
        }

        let ai = self
            .ai
            .as_ref()
            .ok_or_else(|| ExecutionError::InvalidConfig("no AI responder configured".into()))?;

        let conversation = ctx
            .conversation
            .as_ref()
            .ok_or_else(|| ExecutionError::InvalidConfig("no conversation in context".into()))?;
        let contact_id = ctx
            .contact
            .as_ref()
            .map_or(conversation.contact_id.as_str(), |c| c.id.as_str());

        let prompt = self
            .templates
            .render_text(response_template(automation)?, &ctx_value);
        let question = build_question(&prompt, &ctx.messages, ctx.incoming_message.as_ref());

        let answer = ai
            .answer_question(
                &question,
                &conversation.id,
                contact_id,
                conversation.channel_id.as_deref(),
            )
            .await?;

        // The model may echo placeholders back; run its answer through the
        // renderer so they resolve too.
        let rendered = self.templates.render_text(&answer, &ctx_value);
        let message = self.send_reply(ctx, &rendered).await?;
        Ok(Some(AutomationResult::replied(rendered, message)))
    }

    async fn run_trigger(
        &self,
        automation: &Automation,
        ctx: &AutomationContext,
    ) -> Result<Option<AutomationResult>, ExecutionError> {
        let ctx_value = ctx.to_value();
        if !evaluate_rules(
            &automation.trigger.rules,
            automation.trigger.combinator,
            &ctx_value,
        ) {
            return Ok(None);
        }

        self.actions.run_all(&automation.trigger.actions, ctx).await?;
        self.optional_reply(automation, ctx, &ctx_value).await
    }

    async fn run_scheduled(
        &self,
        automation: &Automation,
        ctx: &AutomationContext,
    ) -> Result<Option<AutomationResult>, ExecutionError> {
        let schedule = automation.schedule.as_ref().ok_or_else(|| {
            ExecutionError::InvalidConfig("scheduled automation without a schedule".into())
        })?;

        self.actions.run_all(&schedule.actions, ctx).await?;
        let ctx_value = ctx.to_value();
        self.optional_reply(automation, ctx, &ctx_value).await
    }

    /// Render and send the response template if one is configured.
    /// Without a conversation there is nowhere to send it; the actions
    /// already ran, so that is a silent success, not a failure.
    async fn optional_reply(
        &self,
        automation: &Automation,
        ctx: &AutomationContext,
        ctx_value: &serde_json::Value,
    ) -> Result<Option<AutomationResult>, ExecutionError> {
        let Some(response) = &automation.response else {
            return Ok(Some(AutomationResult::silent()));
        };
        if ctx.conversation.is_none() {
            debug!("response template configured but context has no conversation, skipping reply");
            return Ok(Some(AutomationResult::silent()));
        }
        let rendered = self.templates.render_text(response.template(), ctx_value);
        let message = self.send_reply(ctx, &rendered).await?;
        Ok(Some(AutomationResult::replied(rendered, message)))
    }

    /// Persist the outbound message, then hand it to the channel forwarder.
    async fn send_reply(
        &self,
        ctx: &AutomationContext,
        content: &str,
    ) -> Result<Message, ExecutionError> {
        let conversation = ctx
            .conversation
            .as_ref()
            .ok_or_else(|| ExecutionError::InvalidConfig("no conversation in context".into()))?;

        let message = self
            .storage
            .create_message(NewMessage::outbound(&conversation.id, content))
            .await?;

        if let (Some(forwarder), Some(channel)) = (&self.forwarder, &ctx.channel) {
            forwarder.forward(channel, &message).await?;
        }

        Ok(message)
    }
}

fn response_template(automation: &Automation) -> Result<&str, ExecutionError> {
    automation
        .response
        .as_ref()
        .map(ResponseTemplate::template)
        .ok_or_else(|| ExecutionError::InvalidConfig("automation has no response template".into()))
}

/// Assemble the chatbot question: rendered prompt, recent history, and the
/// incoming message last.
fn build_question(prompt: &str, history: &[Message], incoming: Option<&Message>) -> String {
    let mut question = String::from(prompt);
    if !history.is_empty() {
        question.push_str("\n\nConversation so far:\n");
        for message in history {
            let speaker = if message.is_inbound() { "Contact" } else { "Agent" };
            question.push_str(speaker);
            question.push_str(": ");
            question.push_str(&message.content);
            question.push('\n');
        }
    }
    if let Some(incoming) = incoming {
        question.push_str("\nContact: ");
        question.push_str(&incoming.content);
    }
    question
}
