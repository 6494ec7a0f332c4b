use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::ActionConfig;
use crate::rule::{RuleCombinator, RuleExpr};
use crate::schedule::ScheduleConfig;

/// Execution strategy of an automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AutomationType {
    /// Keyword-matched canned reply to an inbound message.
    QuickReply,
    /// AI-generated reply built from a prompt plus conversation history.
    Chatbot,
    /// Rule-gated action list, optionally with a reply.
    Trigger,
    /// Periodic action list driven by the schedule runner, never by messages.
    Scheduled,
}

impl AutomationType {
    /// Returns `true` for types that fire on inbound messages.
    /// `Scheduled` automations only run via the periodic schedule check.
    #[must_use]
    pub fn is_message_driven(self) -> bool {
        matches!(self, Self::QuickReply | Self::Chatbot | Self::Trigger)
    }
}

/// Trigger configuration, interpreted per automation type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TriggerConfig {
    /// Quick replies match when the inbound text contains any keyword
    /// (case-insensitive).
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Chatbot/trigger eligibility rules. A chatbot with no rules is always
    /// eligible.
    #[serde(default)]
    pub rules: Vec<RuleExpr>,

    #[serde(default)]
    pub combinator: RuleCombinator,

    /// Trigger-type automations run these in order once the rules pass.
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

/// The reply an automation produces on match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(untagged)]
pub enum ResponseTemplate {
    /// Plain text template rendered against the context.
    Text(String),
    /// Chatbot prompt template; the rendered prompt is sent to the AI
    /// collaborator together with the conversation history.
    Prompt {
        prompt: String,
    },
}

impl ResponseTemplate {
    /// The raw template string, whichever shape it is stored in.
    #[must_use]
    pub fn template(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Prompt { prompt } => prompt,
        }
    }
}

/// A stored automation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Automation {
    /// Unique identifier (UUID-v4, assigned on creation).
    pub id: String,

    pub name: String,

    #[serde(rename = "type")]
    pub automation_type: AutomationType,

    /// Inactive automations are never eligible, for any path.
    pub is_active: bool,

    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Present iff `automation_type` is `Scheduled`.
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,

    #[serde(default)]
    pub response: Option<ResponseTemplate>,

    /// Chatbot-only: which AI provider answers, passed through opaquely.
    #[serde(default)]
    pub model_provider: Option<String>,

    /// Chatbot-only: provider-specific settings, passed through opaquely.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub model_config: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Updated on every execution attempt, success or failure alike.
    #[serde(default)]
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl Automation {
    /// Create an inactive-by-default automation with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, automation_type: AutomationType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            automation_type,
            is_active: false,
            trigger: TriggerConfig::default(),
            schedule: None,
            response: None,
            model_provider: None,
            model_config: None,
            created_at: now,
            updated_at: now,
            last_executed_at: None,
        }
    }

    #[must_use]
    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }

    #[must_use]
    pub fn with_trigger(mut self, trigger: TriggerConfig) -> Self {
        self.trigger = trigger;
        self
    }

    #[must_use]
    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = Some(schedule);
        self
    }

    #[must_use]
    pub fn with_response(mut self, response: ResponseTemplate) -> Self {
        self.response = Some(response);
        self
    }

    /// Returns `true` if this automation may fire for an inbound message.
    #[must_use]
    pub fn is_message_eligible(&self) -> bool {
        self.is_active && self.automation_type.is_message_driven()
    }
}
