//! Automation CRUD and manual execution endpoints.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use utoipa::IntoParams;

use talaria_core::{Automation, AutomationType};
use talaria_rules::validate_schedule;

use super::AppState;
use super::schemas::{
    AutomationStatsResponse, AutomationTypeStats, CreateAutomationRequest, ExecuteResponse,
    UpdateAutomationRequest,
};
use crate::error::ServerError;

/// Query parameters for listing automations.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Restrict to one automation type.
    #[serde(rename = "type")]
    pub automation_type: Option<AutomationType>,
}

/// `GET /automations`
#[utoipa::path(
    get,
    path = "/automations",
    tag = "Automations",
    summary = "List automations",
    params(ListQuery),
    responses((status = 200, body = [Automation]), (status = 401, description = "Unauthenticated"))
)]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Automation>>, ServerError> {
    Ok(Json(
        state.storage.get_automations(query.automation_type).await?,
    ))
}

/// `POST /automations`
#[utoipa::path(
    post,
    path = "/automations",
    tag = "Automations",
    summary = "Create an automation",
    request_body = CreateAutomationRequest,
    responses(
        (status = 201, body = Automation),
        (status = 400, description = "Invalid schedule configuration")
    )
)]
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateAutomationRequest>,
) -> Result<impl IntoResponse, ServerError> {
    if let Some(schedule) = &request.schedule {
        validate_schedule(schedule)?;
    }
    let automation = state
        .storage
        .create_automation(request.into_automation())
        .await?;
    Ok((StatusCode::CREATED, Json(automation)))
}

/// `GET /automations/{id}`
#[utoipa::path(
    get,
    path = "/automations/{id}",
    tag = "Automations",
    summary = "Fetch one automation",
    params(("id" = String, Path, description = "Automation id")),
    responses((status = 200, body = Automation), (status = 404, description = "No such automation"))
)]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Automation>, ServerError> {
    Ok(Json(state.storage.get_automation(&id).await?))
}

/// `PUT`/`PATCH /automations/{id}`
#[utoipa::path(
    put,
    path = "/automations/{id}",
    tag = "Automations",
    summary = "Update an automation",
    params(("id" = String, Path, description = "Automation id")),
    request_body = UpdateAutomationRequest,
    responses(
        (status = 200, body = Automation),
        (status = 400, description = "Invalid schedule configuration"),
        (status = 404, description = "No such automation")
    )
)]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAutomationRequest>,
) -> Result<Json<Automation>, ServerError> {
    if let Some(schedule) = &request.schedule {
        validate_schedule(schedule)?;
    }
    let automation = state
        .storage
        .update_automation(&id, request.into())
        .await?;
    Ok(Json(automation))
}

/// `DELETE /automations/{id}`
#[utoipa::path(
    delete,
    path = "/automations/{id}",
    tag = "Automations",
    summary = "Delete an automation",
    params(("id" = String, Path, description = "Automation id")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "No such automation"))
)]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.storage.delete_automation(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /automations/{id}/execute` -- force-run one automation now.
#[utoipa::path(
    post,
    path = "/automations/{id}/execute",
    tag = "Automations",
    summary = "Execute an automation immediately",
    params(("id" = String, Path, description = "Automation id")),
    responses(
        (status = 200, body = ExecuteResponse),
        (status = 404, description = "No such automation")
    )
)]
pub async fn execute(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExecuteResponse>, ServerError> {
    let result = state.service.execute_automation(&id).await?;
    Ok(Json(ExecuteResponse {
        matched: result.is_some(),
        result,
    }))
}

/// `GET /automations-stats`
#[utoipa::path(
    get,
    path = "/automations-stats",
    tag = "Automations",
    summary = "Per-type automation statistics",
    responses((status = 200, body = AutomationStatsResponse), (status = 401, description = "Unauthenticated"))
)]
pub async fn stats(
    State(state): State<AppState>,
) -> Result<Json<AutomationStatsResponse>, ServerError> {
    let automations = state.storage.get_automations(None).await?;

    let mut by_type: BTreeMap<String, AutomationTypeStats> = BTreeMap::new();
    for automation in &automations {
        let key = format!("{:?}", automation.automation_type);
        let entry = by_type
            .entry(key)
            .or_insert_with(|| AutomationTypeStats {
                automation_type: automation.automation_type,
                total: 0,
                active: 0,
                executed: 0,
                last_executed_at: None,
            });
        entry.total += 1;
        if automation.is_active {
            entry.active += 1;
        }
        if let Some(at) = automation.last_executed_at {
            entry.executed += 1;
            entry.last_executed_at = Some(entry.last_executed_at.map_or(at, |prev| prev.max(at)));
        }
    }

    Ok(Json(AutomationStatsResponse {
        total: automations.len() as u64,
        by_type: by_type.into_values().collect(),
    }))
}
