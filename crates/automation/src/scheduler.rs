//! Background runner for scheduled automations.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info};

use crate::service::AutomationService;

/// Configuration for the schedule runner.
#[derive(Debug, Clone)]
pub struct ScheduleRunnerConfig {
    /// How often due schedules are checked (default: 60 seconds).
    pub check_interval: Duration,
}

impl Default for ScheduleRunnerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
        }
    }
}

/// Periodically invokes the service's schedule check until shutdown.
///
/// Independent of the webhook queue loop: a slow scheduled batch never
/// blocks message-driven automation, and vice versa.
pub struct ScheduleRunner {
    service: Arc<AutomationService>,
    config: ScheduleRunnerConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

impl ScheduleRunner {
    /// Create a runner and the sender used to stop it.
    pub fn new(
        service: Arc<AutomationService>,
        config: ScheduleRunnerConfig,
    ) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            Self {
                service,
                config,
                shutdown_rx,
            },
            shutdown_tx,
        )
    }

    /// Run until shutdown is signaled.
    pub async fn run(&mut self) {
        info!(interval = ?self.config.check_interval, "schedule runner starting");
        let mut tick = interval(self.config.check_interval);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("schedule runner received shutdown signal");
                    break;
                }
                _ = tick.tick() => {
                    let results = self.service.process_scheduled_automations().await;
                    if !results.is_empty() {
                        let failed = results.iter().filter(|r| !r.success).count();
                        info!(
                            executed = results.len(),
                            failed,
                            "scheduled automations processed"
                        );
                    } else {
                        debug!("no scheduled automations due");
                    }
                }
            }
        }

        info!("schedule runner stopped");
    }
}
