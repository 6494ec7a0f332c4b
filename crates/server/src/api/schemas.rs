//! Request/response bodies for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use talaria_core::{
    Automation, AutomationResult, AutomationType, QueueItemStatus, ResponseTemplate,
    ScheduleConfig, TriggerConfig,
};
use talaria_queue::QueueMetricsSnapshot;
use talaria_storage::AutomationUpdate;

/// Body for `POST /webhooks/{source}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EnqueueRequest {
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Raw webhook body, stored verbatim.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    /// Lower is processed first; defaults to the queue's base priority.
    #[serde(default)]
    pub priority: Option<i32>,
}

/// Acknowledgement for an accepted webhook.
#[derive(Debug, Serialize, ToSchema)]
pub struct EnqueueResponse {
    pub id: u64,
    pub status: QueueItemStatus,
}

fn default_max_age_days() -> u32 {
    7
}

/// Body for `POST /webhook-queue/cleanup`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CleanupRequest {
    /// Completed items older than this many days are removed.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupResponse {
    pub deleted: u64,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RebalanceResponse {
    /// Pending items whose priority changed.
    pub count: u64,
}

/// Queue throughput counters since process start.
#[derive(Debug, Serialize, ToSchema)]
pub struct PerformanceResponse {
    pub enqueued: u64,
    pub completed: u64,
    pub failed_attempts: u64,
    pub dead_lettered: u64,
    pub retried: u64,
    pub rebalanced: u64,
    pub cleaned: u64,
}

impl From<QueueMetricsSnapshot> for PerformanceResponse {
    fn from(snapshot: QueueMetricsSnapshot) -> Self {
        Self {
            enqueued: snapshot.enqueued,
            completed: snapshot.completed,
            failed_attempts: snapshot.failed_attempts,
            dead_lettered: snapshot.dead_lettered,
            retried: snapshot.retried,
            rebalanced: snapshot.rebalanced,
            cleaned: snapshot.cleaned,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub queue: PerformanceResponse,
}

/// Body for `POST /automations`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAutomationRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub automation_type: AutomationType,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
    #[serde(default)]
    pub response: Option<ResponseTemplate>,
    #[serde(default)]
    pub model_provider: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub model_config: Option<serde_json::Value>,
}

impl CreateAutomationRequest {
    /// Materialize the stored automation (fresh id + timestamps).
    #[must_use]
    pub fn into_automation(self) -> Automation {
        let mut automation = Automation::new(self.name, self.automation_type);
        automation.is_active = self.is_active;
        automation.trigger = self.trigger;
        automation.schedule = self.schedule;
        automation.response = self.response;
        automation.model_provider = self.model_provider;
        automation.model_config = self.model_config;
        automation
    }
}

/// Body for `PUT`/`PATCH /automations/{id}`. Absent fields are untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAutomationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub trigger: Option<TriggerConfig>,
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
    #[serde(default)]
    pub response: Option<ResponseTemplate>,
    #[serde(default)]
    pub model_provider: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub model_config: Option<serde_json::Value>,
}

impl From<UpdateAutomationRequest> for AutomationUpdate {
    fn from(request: UpdateAutomationRequest) -> Self {
        Self {
            name: request.name,
            is_active: request.is_active,
            trigger: request.trigger,
            schedule: request.schedule,
            response: request.response,
            model_provider: request.model_provider,
            model_config: request.model_config,
        }
    }
}

/// Outcome of a manual `POST /automations/{id}/execute`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExecuteResponse {
    /// `false` when the automation ran its eligibility check and declined.
    pub matched: bool,
    #[serde(default)]
    pub result: Option<AutomationResult>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AutomationTypeStats {
    #[serde(rename = "type")]
    pub automation_type: AutomationType,
    pub total: u64,
    pub active: u64,
    /// Automations of this type that have executed at least once.
    pub executed: u64,
    pub last_executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AutomationStatsResponse {
    pub total: u64,
    pub by_type: Vec<AutomationTypeStats>,
}
