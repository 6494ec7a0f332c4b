use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use talaria_ai::{AiResponder, HttpAiResponder};
use talaria_automation::{
    ActionRunner, AutomationExecutor, AutomationService, ScheduleRunner, ScheduleRunnerConfig,
    WebhookOptions,
};
use talaria_queue::{
    HandlerRegistry, MessageIngestHandler, PaymentWebhookHandler, WebhookQueue,
};
use talaria_server::api::{AppState, router};
use talaria_server::{ServerConfig, ServerError, telemetry};
use talaria_storage::{QueueStore, Storage};
use talaria_storage_memory::{MemoryQueueStore, MemoryStorage};
use talaria_template::TemplateEngine;

#[derive(Debug, Parser)]
#[command(
    name = "talaria-server",
    about = "Webhook ingestion queue and automation engine"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "talaria.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    telemetry::init();

    let args = Args::parse();
    let config = if args.config.exists() {
        ServerConfig::load(&args.config)?
    } else {
        info!(path = %args.config.display(), "no config file found, using defaults");
        ServerConfig::default()
    };

    // Storage backends. The in-memory backend ships with the engine;
    // persistent deployments implement the same traits against their own
    // engine and swap them in here. A backend that cannot come up makes
    // this construction fail, which is fatal by design.
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let queue_store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());

    // Automation pipeline.
    let templates = Arc::new(TemplateEngine::new());
    let actions = ActionRunner::new(
        Arc::clone(&storage),
        Arc::clone(&templates),
        WebhookOptions {
            timeout: Duration::from_secs(config.webhook_actions.timeout_secs),
            signing_secret: config.webhook_actions.signing_secret.clone(),
        },
    )?;
    let mut executor = AutomationExecutor::new(Arc::clone(&storage), templates, actions);
    if let Some(ai_config) = config.ai.clone() {
        let responder: Arc<dyn AiResponder> = Arc::new(
            HttpAiResponder::new(ai_config)
                .map_err(|e| ServerError::Config(format!("AI responder: {e}")))?,
        );
        executor = executor.with_ai(responder);
    }
    let service = Arc::new(AutomationService::new(Arc::clone(&storage), executor));

    // Webhook queue: default route ingests messages, payment callbacks get
    // their own handler.
    let handlers = HandlerRegistry::new(Arc::new(MessageIngestHandler::new(
        Arc::clone(&storage),
        Arc::clone(&service),
    )))
    .with_handler(
        "payment",
        Arc::new(PaymentWebhookHandler::new(
            Arc::clone(&storage),
            config.payment_notify_users.clone(),
        )),
    );
    let queue = Arc::new(WebhookQueue::new(
        queue_store,
        handlers,
        config.queue.clone(),
    ));
    queue.start_processing();

    // Scheduled automations tick independently of the queue loop.
    let (mut schedule_runner, schedule_shutdown) = ScheduleRunner::new(
        Arc::clone(&service),
        ScheduleRunnerConfig {
            check_interval: Duration::from_secs(config.scheduler.check_interval_secs),
        },
    );
    let schedule_handle = tokio::spawn(async move { schedule_runner.run().await });

    let state = AppState {
        queue: Arc::clone(&queue),
        service,
        storage,
        api_token: config.auth.api_token.as_deref().map(Arc::from),
    };

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!(addr = %config.listen, "talaria server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    queue.stop_processing();
    let _ = schedule_shutdown.send(()).await;
    let _ = schedule_handle.await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
