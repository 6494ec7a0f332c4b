use utoipa::OpenApi;

use talaria_core::{
    ActionConfig, Automation, AutomationResult, AutomationType, Message, MessageDirection,
    QueueItemStatus, QueueStatus, ResponseTemplate, RuleCombinator, RuleExpr, RuleOperator,
    ScheduleCadence, ScheduleConfig, ScheduleTarget, SourceStats, TriggerConfig, WebhookMethod,
    WebhookQueueItem,
};

use super::schemas::{
    AutomationStatsResponse, AutomationTypeStats, CleanupRequest, CleanupResponse,
    CreateAutomationRequest, EnqueueRequest, EnqueueResponse, ExecuteResponse, HealthResponse,
    PerformanceResponse, RebalanceResponse, UpdateAutomationRequest,
};
use super::{automations, health, queue};

/// OpenAPI document served at `/api-docs/openapi.json` and rendered by the
/// Swagger UI at `/docs`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Talaria API",
        description = "Webhook ingestion queue and automation engine"
    ),
    paths(
        health::health,
        queue::ingest,
        queue::status,
        queue::stats,
        queue::performance,
        queue::rebalance,
        queue::retry,
        queue::cleanup,
        automations::list,
        automations::create,
        automations::get,
        automations::update,
        automations::delete,
        automations::execute,
        automations::stats,
    ),
    components(schemas(
        ActionConfig,
        Automation,
        AutomationResult,
        AutomationType,
        Message,
        MessageDirection,
        QueueItemStatus,
        QueueStatus,
        ResponseTemplate,
        RuleCombinator,
        RuleExpr,
        RuleOperator,
        ScheduleCadence,
        ScheduleConfig,
        ScheduleTarget,
        SourceStats,
        TriggerConfig,
        WebhookMethod,
        WebhookQueueItem,
        EnqueueRequest,
        EnqueueResponse,
        CleanupRequest,
        CleanupResponse,
        RebalanceResponse,
        PerformanceResponse,
        HealthResponse,
        CreateAutomationRequest,
        UpdateAutomationRequest,
        ExecuteResponse,
        AutomationStatsResponse,
        AutomationTypeStats,
    )),
    tags(
        (name = "Health", description = "Liveness and metrics"),
        (name = "Webhooks", description = "Producer-facing ingestion"),
        (name = "Queue", description = "Queue management"),
        (name = "Automations", description = "Automation CRUD and execution"),
    )
)]
pub struct ApiDoc;
