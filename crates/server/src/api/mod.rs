//! Axum router and shared application state.

pub mod automations;
pub mod health;
pub mod openapi;
pub mod queue;
pub mod schemas;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use talaria_automation::AutomationService;
use talaria_queue::WebhookQueue;
use talaria_storage::Storage;

use self::openapi::ApiDoc;
use crate::auth::require_auth;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<WebhookQueue>,
    pub service: Arc<AutomationService>,
    pub storage: Arc<dyn Storage>,
    /// Bearer token for mutating routes; `None` disables auth.
    pub api_token: Option<Arc<str>>,
}

/// Build the router with all API routes, middleware, and Swagger UI.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        // Liveness (always public).
        .route("/health", get(health::health))
        // Producer-facing ingestion surface.
        .route("/webhooks/{source}", post(queue::ingest));

    let protected = Router::new()
        // Automations
        .route(
            "/automations",
            get(automations::list).post(automations::create),
        )
        .route(
            "/automations/{id}",
            get(automations::get)
                .put(automations::update)
                .patch(automations::update)
                .delete(automations::delete),
        )
        .route("/automations/{id}/execute", post(automations::execute))
        .route("/automations-stats", get(automations::stats))
        // Queue management
        .route("/webhook-queue/status", get(queue::status))
        .route("/webhook-queue/stats", get(queue::stats))
        .route("/webhook-queue/performance", get(queue::performance))
        .route("/webhook-queue/rebalance", post(queue::rebalance))
        .route("/webhook-queue/{id}/retry", post(queue::retry))
        .route("/webhook-queue/cleanup", post(queue::cleanup))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use serde_json::json;

    use super::*;
    use talaria_automation::{ActionRunner, AutomationExecutor, WebhookOptions};
    use talaria_queue::{HandlerRegistry, MessageIngestHandler, QueueConfig};
    use talaria_storage_memory::{MemoryQueueStore, MemoryStorage};
    use talaria_template::TemplateEngine;

    fn test_state(api_token: Option<&str>) -> AppState {
        let storage = Arc::new(MemoryStorage::new());
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
        );
        let service = Arc::new(AutomationService::new(
            Arc::clone(&storage) as Arc<dyn Storage>,
            executor,
        ));
        let registry = HandlerRegistry::new(Arc::new(MessageIngestHandler::new(
            Arc::clone(&storage) as Arc<dyn Storage>,
            Arc::clone(&service),
        )));
        let queue = Arc::new(WebhookQueue::new(
            Arc::new(MemoryQueueStore::new()),
            registry,
            QueueConfig::default(),
        ));

        AppState {
            queue,
            service,
            storage,
            api_token: api_token.map(Arc::from),
        }
    }

    fn server(state: AppState) -> TestServer {
        TestServer::new(router(state)).expect("router should build")
    }

    #[tokio::test]
    async fn health_is_public() {
        let server = server(test_state(Some("secret")));
        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn webhook_ingestion_is_public_and_validates() {
        let server = server(test_state(Some("secret")));

        let accepted = server
            .post("/webhooks/whatsapp")
            .json(&json!({"payload": {"conversation_id": "conv-1", "content": "oi"}}))
            .await;
        accepted.assert_status(axum::http::StatusCode::ACCEPTED);
        let body: serde_json::Value = accepted.json();
        assert_eq!(body["status"], "pending");

        let rejected = server
            .post("/webhooks/whatsapp")
            .json(&json!({"payload": null}))
            .await;
        rejected.assert_status(axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn protected_routes_require_the_token() {
        let server = server(test_state(Some("secret")));

        let denied = server.get("/webhook-queue/status").await;
        denied.assert_status(axum::http::StatusCode::UNAUTHORIZED);

        let wrong = server
            .get("/webhook-queue/status")
            .authorization_bearer("wrong")
            .await;
        wrong.assert_status(axum::http::StatusCode::UNAUTHORIZED);

        let allowed = server
            .get("/webhook-queue/status")
            .authorization_bearer("secret")
            .await;
        allowed.assert_status_ok();
        let body: serde_json::Value = allowed.json();
        assert_eq!(body["is_processing"], false);
    }

    #[tokio::test]
    async fn auth_disabled_when_no_token_configured() {
        let server = server(test_state(None));
        server.get("/webhook-queue/status").await.assert_status_ok();
    }

    #[tokio::test]
    async fn automation_crud_roundtrip() {
        let server = server(test_state(None));

        let created = server
            .post("/automations")
            .json(&json!({
                "name": "pricing",
                "type": "quick_reply",
                "is_active": true,
                "trigger": {"keywords": ["preço", "valor"]},
                "response": "Planos a partir de R$49",
            }))
            .await;
        created.assert_status(axum::http::StatusCode::CREATED);
        let automation: serde_json::Value = created.json();
        let id = automation["id"].as_str().unwrap().to_owned();

        let fetched = server.get(&format!("/automations/{id}")).await;
        fetched.assert_status_ok();

        let updated = server
            .put(&format!("/automations/{id}"))
            .json(&json!({"is_active": false}))
            .await;
        updated.assert_status_ok();
        let updated: serde_json::Value = updated.json();
        assert_eq!(updated["is_active"], false);

        let listed = server.get("/automations?type=quick_reply").await;
        listed.assert_status_ok();
        let listed: serde_json::Value = listed.json();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let deleted = server.delete(&format!("/automations/{id}")).await;
        deleted.assert_status(axum::http::StatusCode::NO_CONTENT);

        let missing = server.get(&format!("/automations/{id}")).await;
        missing.assert_status(axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_schedule_is_rejected_at_create() {
        let server = server(test_state(None));
        let response = server
            .post("/automations")
            .json(&json!({
                "name": "broken",
                "type": "scheduled",
                "schedule": {
                    "target": "all",
                    "cadence": {"kind": "cron", "expr": "not a cron"},
                },
            }))
            .await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn manual_execute_reports_match_state() {
        let server = server(test_state(None));

        let created = server
            .post("/automations")
            .json(&json!({
                "name": "pricing",
                "type": "quick_reply",
                "is_active": true,
                "trigger": {"keywords": ["valor"]},
                "response": "R$49",
            }))
            .await;
        let automation: serde_json::Value = created.json();
        let id = automation["id"].as_str().unwrap();

        // No incoming message in a manual context, so the keyword check
        // cannot match.
        let executed = server.post(&format!("/automations/{id}/execute")).await;
        executed.assert_status_ok();
        let body: serde_json::Value = executed.json();
        assert_eq!(body["matched"], false);
    }

    #[tokio::test]
    async fn retry_of_unknown_item_is_404() {
        let server = server(test_state(None));
        let response = server.post("/webhook-queue/999/retry").await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn automation_stats_aggregate_by_type() {
        let server = server(test_state(None));
        for name in ["a", "b"] {
            server
                .post("/automations")
                .json(&json!({
                    "name": name,
                    "type": "quick_reply",
                    "is_active": name == "a",
                    "trigger": {"keywords": ["x"]},
                    "response": "ok",
                }))
                .await
                .assert_status(axum::http::StatusCode::CREATED);
        }

        let stats = server.get("/automations-stats").await;
        stats.assert_status_ok();
        let body: serde_json::Value = stats.json();
        assert_eq!(body["total"], 2);
        assert_eq!(body["by_type"][0]["total"], 2);
        assert_eq!(body["by_type"][0]["active"], 1);
    }
}
