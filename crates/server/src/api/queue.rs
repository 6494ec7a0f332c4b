//! Webhook ingestion and queue management endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use talaria_core::{QueueStatus, SourceStats, WebhookQueueItem};

use super::AppState;
use super::schemas::{
    CleanupRequest, CleanupResponse, EnqueueRequest, EnqueueResponse, PerformanceResponse,
    RebalanceResponse,
};
use crate::error::ServerError;

/// `POST /webhooks/{source}` -- the producer-facing ingestion surface.
#[utoipa::path(
    post,
    path = "/webhooks/{source}",
    tag = "Webhooks",
    summary = "Enqueue an inbound webhook",
    params(("source" = String, Path, description = "Producer tag (channel type or payment provider)")),
    request_body = EnqueueRequest,
    responses(
        (status = 202, description = "Webhook accepted for processing", body = EnqueueResponse),
        (status = 400, description = "Empty source or null payload")
    )
)]
pub async fn ingest(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Json(request): Json<EnqueueRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let item = state
        .queue
        .enqueue(&source, request.channel_id, request.payload, request.priority)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            id: item.id,
            status: item.status,
        }),
    ))
}

/// `GET /webhook-queue/status`
#[utoipa::path(
    get,
    path = "/webhook-queue/status",
    tag = "Queue",
    summary = "Point-in-time queue counts",
    responses((status = 200, body = QueueStatus), (status = 401, description = "Unauthenticated"))
)]
pub async fn status(State(state): State<AppState>) -> Result<Json<QueueStatus>, ServerError> {
    Ok(Json(state.queue.status().await?))
}

/// `GET /webhook-queue/stats`
#[utoipa::path(
    get,
    path = "/webhook-queue/stats",
    tag = "Queue",
    summary = "Per-source queue statistics",
    responses((status = 200, body = [SourceStats]), (status = 401, description = "Unauthenticated"))
)]
pub async fn stats(State(state): State<AppState>) -> Result<Json<Vec<SourceStats>>, ServerError> {
    Ok(Json(state.queue.stats_by_source().await?))
}

/// `GET /webhook-queue/performance`
#[utoipa::path(
    get,
    path = "/webhook-queue/performance",
    tag = "Queue",
    summary = "Queue throughput counters",
    responses((status = 200, body = PerformanceResponse), (status = 401, description = "Unauthenticated"))
)]
pub async fn performance(State(state): State<AppState>) -> Json<PerformanceResponse> {
    Json(state.queue.metrics().snapshot().into())
}

/// `POST /webhook-queue/rebalance`
#[utoipa::path(
    post,
    path = "/webhook-queue/rebalance",
    tag = "Queue",
    summary = "Recompute pending priorities from per-source stats",
    responses((status = 200, body = RebalanceResponse), (status = 401, description = "Unauthenticated"))
)]
pub async fn rebalance(
    State(state): State<AppState>,
) -> Result<Json<RebalanceResponse>, ServerError> {
    let report = state.queue.rebalance().await?;
    Ok(Json(RebalanceResponse {
        count: report.count,
    }))
}

/// `POST /webhook-queue/{id}/retry`
#[utoipa::path(
    post,
    path = "/webhook-queue/{id}/retry",
    tag = "Queue",
    summary = "Force a failed item back to pending",
    params(("id" = u64, Path, description = "Queue item id")),
    responses(
        (status = 200, body = WebhookQueueItem),
        (status = 404, description = "No such item"),
        (status = 409, description = "Item is not in the failed state")
    )
)]
pub async fn retry(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<WebhookQueueItem>, ServerError> {
    Ok(Json(state.queue.retry(id).await?))
}

/// `POST /webhook-queue/cleanup`
#[utoipa::path(
    post,
    path = "/webhook-queue/cleanup",
    tag = "Queue",
    summary = "Delete old completed items",
    request_body = CleanupRequest,
    responses((status = 200, body = CleanupResponse), (status = 401, description = "Unauthenticated"))
)]
pub async fn cleanup(
    State(state): State<AppState>,
    Json(request): Json<CleanupRequest>,
) -> Result<Json<CleanupResponse>, ServerError> {
    let report = state.queue.cleanup(request.max_age_days).await?;
    Ok(Json(CleanupResponse {
        deleted: report.deleted,
        message: format!(
            "deleted {} completed item(s) older than {} day(s)",
            report.deleted, request.max_age_days
        ),
    }))
}
