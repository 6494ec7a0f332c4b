//! The webhook queue: durable, priority-ordered, at-least-once processing
//! with bounded retries.
//!
//! One logical background loop claims items one at a time, so side effects
//! against storage are serialized per loop instance. The claim itself is a
//! conditional transition in the store; running several loop instances
//! against a shared store cannot double-process an item.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, instrument, warn};

use talaria_core::{NewQueueItem, QueueStatus, SourceStats, WebhookQueueItem};
use talaria_storage::QueueStore;

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::handler::HandlerRegistry;
use crate::metrics::QueueMetrics;
use crate::rebalance::compute_priorities;

/// Result of a `rebalance` call.
#[derive(Debug, Clone, Copy)]
pub struct RebalanceReport {
    /// Pending items whose priority changed.
    pub count: u64,
}

/// Result of a `cleanup` call.
#[derive(Debug, Clone, Copy)]
pub struct CleanupReport {
    /// Completed items removed.
    pub deleted: u64,
    /// Items completed before this instant were eligible.
    pub cutoff: DateTime<Utc>,
}

/// The webhook ingestion queue.
pub struct WebhookQueue {
    store: Arc<dyn QueueStore>,
    handlers: HandlerRegistry,
    config: QueueConfig,
    metrics: Arc<QueueMetrics>,
    running: AtomicBool,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl WebhookQueue {
    pub fn new(store: Arc<dyn QueueStore>, handlers: HandlerRegistry, config: QueueConfig) -> Self {
        Self {
            store,
            handlers,
            config,
            metrics: Arc::new(QueueMetrics::default()),
            running: AtomicBool::new(false),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Queue throughput counters.
    #[must_use]
    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    /// Accept a webhook for processing.
    ///
    /// Rejected with [`QueueError::Validation`] before persistence when the
    /// source is empty or the payload carries no data.
    pub async fn enqueue(
        &self,
        source: &str,
        channel_id: Option<String>,
        payload: serde_json::Value,
        priority: Option<i32>,
    ) -> Result<WebhookQueueItem, QueueError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(QueueError::Validation("source must not be empty".into()));
        }
        if payload.is_null() {
            return Err(QueueError::Validation("payload must not be null".into()));
        }

        let mut new_item = NewQueueItem::new(source, payload);
        new_item.channel_id = channel_id;
        if let Some(priority) = priority {
            new_item.priority = priority;
        }

        let item = self.store.insert(new_item).await?;
        self.metrics.increment_enqueued();
        debug!(item_id = item.id, source = %item.source, priority = item.priority, "webhook enqueued");
        Ok(item)
    }

    /// Start the background processing loop.
    ///
    /// Idempotent: returns `false` (and starts nothing) if the loop is
    /// already running.
    pub fn start_processing(self: &Arc<Self>) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("processing loop already running");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        if let Ok(mut guard) = self.shutdown_tx.lock() {
            *guard = Some(shutdown_tx);
        }

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            queue.run_loop(shutdown_rx).await;
        });
        true
    }

    /// Signal the loop to stop after the in-flight item (if any) completes.
    pub fn stop_processing(&self) {
        let sender = self.shutdown_tx.lock().ok().and_then(|mut guard| guard.take());
        if let Some(sender) = sender {
            // If the loop already exited, the send fails harmlessly; the
            // dropped sender alone also signals shutdown.
            let _ = sender.try_send(());
        }
    }

    /// Whether the background loop is currently running.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Point-in-time status counts.
    pub async fn status(&self) -> Result<QueueStatus, QueueError> {
        let counts = self.store.counts().await?;
        Ok(QueueStatus {
            pending: counts.pending,
            processing: counts.processing,
            failed: counts.failed,
            is_processing: self.is_processing(),
        })
    }

    /// Per-source throughput and failure statistics.
    pub async fn stats_by_source(&self) -> Result<Vec<SourceStats>, QueueError> {
        Ok(self.store.stats_by_source().await?)
    }

    /// Force a failed item back to pending for another round of attempts.
    pub async fn retry(&self, id: u64) -> Result<WebhookQueueItem, QueueError> {
        let item = self
            .store
            .retry_failed(id)
            .await
            .map_err(|e| QueueError::from_storage(id, e))?;
        self.metrics.increment_retried();
        info!(item_id = id, attempts = item.attempts, "failed item manually retried");
        Ok(item)
    }

    /// Recompute pending priorities from the current per-source stats.
    pub async fn rebalance(&self) -> Result<RebalanceReport, QueueError> {
        let stats = self.store.stats_by_source().await?;
        let priorities = compute_priorities(&stats, &self.config.rebalance);
        let count = self.store.reprioritize_pending(&priorities).await?;
        self.metrics.add_rebalanced(count);
        info!(count, sources = priorities.len(), "queue rebalanced");
        Ok(RebalanceReport { count })
    }

    /// Delete completed items older than `max_age_days`.
    /// Pending, processing, and failed items are never touched.
    pub async fn cleanup(&self, max_age_days: u32) -> Result<CleanupReport, QueueError> {
        let cutoff = Utc::now() - Duration::days(i64::from(max_age_days));
        let deleted = self.store.delete_completed_before(cutoff).await?;
        self.metrics.add_cleaned(deleted);
        info!(deleted, %cutoff, "queue cleanup complete");
        Ok(CleanupReport { deleted, cutoff })
    }

    async fn run_loop(self: Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) {
        info!("webhook queue processing loop started");

        loop {
            // Shutdown is honored between items only; an in-flight item
            // always runs to completion.
            match shutdown_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            match self.store.claim_next(Utc::now()).await {
                Ok(Some(item)) => self.process_item(item).await,
                Ok(None) => {
                    if self.idle_wait(&mut shutdown_rx).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to claim next queue item");
                    if self.idle_wait(&mut shutdown_rx).await {
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("webhook queue processing loop stopped");
    }

    /// Sleep for the poll interval; returns `true` if shutdown arrived.
    async fn idle_wait(&self, shutdown_rx: &mut mpsc::Receiver<()>) -> bool {
        tokio::select! {
            _ = shutdown_rx.recv() => true,
            () = tokio::time::sleep(self.config.poll_interval()) => false,
        }
    }

    /// Process one claimed item. Never lets an error escape the iteration:
    /// every failure is classified into a status transition + `last_error`.
    #[instrument(skip(self, item), fields(item_id = item.id, source = %item.source, attempt = item.attempts))]
    async fn process_item(&self, item: WebhookQueueItem) {
        let handler = self.handlers.resolve(&item.source);
        let started = Instant::now();
        let outcome =
            tokio::time::timeout(self.config.handler_timeout(), handler.handle(&item)).await;
        #[allow(clippy::cast_possible_truncation)]
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(())) => {
                match self.store.complete(item.id, elapsed_ms).await {
                    Ok(()) => {
                        self.metrics.increment_completed();
                        debug!(elapsed_ms, handler = handler.name(), "queue item completed");
                    }
                    Err(e) => error!(error = %e, "failed to mark item completed"),
                }
            }
            Ok(Err(e)) => self.record_failure(&item, e.to_string()).await,
            Err(_) => {
                self.record_failure(
                    &item,
                    format!("handler timed out after {}ms", self.config.handler_timeout_ms),
                )
                .await;
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn record_failure(&self, item: &WebhookQueueItem, reason: String) {
        if item.attempts >= self.config.max_attempts {
            warn!(
                attempts = item.attempts,
                error = %reason,
                "queue item exhausted its attempts, dead-lettering"
            );
            match self.store.fail(item.id, &reason).await {
                Ok(()) => self.metrics.increment_dead_lettered(),
                Err(e) => error!(error = %e, "failed to dead-letter item"),
            }
            return;
        }

        let delay = self.config.backoff.delay_for(item.attempts);
        let process_after = Utc::now()
            + Duration::from_std(delay).unwrap_or_else(|_| Duration::seconds(3600));
        warn!(
            attempts = item.attempts,
            delay_ms = delay.as_millis() as u64,
            error = %reason,
            "queue item failed, scheduling retry"
        );
        match self.store.retry_later(item.id, process_after, &reason).await {
            Ok(()) => self.metrics.increment_failed_attempts(),
            Err(e) => error!(error = %e, "failed to schedule retry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::backoff::Backoff;
    use crate::handler::{HandlerError, WebhookHandler};
    use talaria_core::QueueItemStatus;
    use talaria_storage_memory::MemoryQueueStore;

    /// Records the order in which sources were handled.
    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WebhookHandler for RecordingHandler {
        fn name(&self) -> &str {
            "recording"
        }

        async fn handle(&self, item: &WebhookQueueItem) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(item.source.clone());
            Ok(())
        }
    }

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyHandler {
        failures_left: AtomicU32,
    }

    impl FlakyHandler {
        fn failing(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl WebhookHandler for FlakyHandler {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn handle(&self, _item: &WebhookQueueItem) -> Result<(), HandlerError> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                Err(HandlerError::new("boom"))
            } else {
                Ok(())
            }
        }
    }

    /// Sleeps, then succeeds.
    struct SlowHandler {
        delay: StdDuration,
    }

    #[async_trait]
    impl WebhookHandler for SlowHandler {
        fn name(&self) -> &str {
            "slow"
        }

        async fn handle(&self, _item: &WebhookQueueItem) -> Result<(), HandlerError> {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    fn fast_config() -> QueueConfig {
        QueueConfig {
            max_attempts: 5,
            backoff: Backoff {
                base: StdDuration::ZERO,
                multiplier: 2.0,
                max: StdDuration::ZERO,
            },
            poll_interval_ms: 10,
            handler_timeout_ms: 5_000,
            ..QueueConfig::default()
        }
    }

    fn queue_with(handler: Arc<dyn WebhookHandler>, config: QueueConfig) -> Arc<WebhookQueue> {
        Arc::new(WebhookQueue::new(
            Arc::new(MemoryQueueStore::new()),
            HandlerRegistry::new(handler),
            config,
        ))
    }

    async fn wait_until_drained(queue: &WebhookQueue) {
        for _ in 0..500 {
            let status = queue.status().await.unwrap();
            if status.pending == 0 && status.processing == 0 {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        panic!("queue did not drain in time");
    }

    #[tokio::test]
    async fn enqueue_validates_input() {
        let queue = queue_with(Arc::new(RecordingHandler::default()), fast_config());
        assert!(matches!(
            queue.enqueue("  ", None, json!({"x": 1}), None).await,
            Err(QueueError::Validation(_))
        ));
        assert!(matches!(
            queue.enqueue("sms", None, serde_json::Value::Null, None).await,
            Err(QueueError::Validation(_))
        ));

        let item = queue.enqueue("sms", None, json!({"x": 1}), None).await.unwrap();
        assert_eq!(item.status, QueueItemStatus::Pending);
        assert_eq!(item.priority, talaria_core::DEFAULT_PRIORITY);
    }

    #[tokio::test]
    async fn lower_priority_number_is_processed_first() {
        let handler = Arc::new(RecordingHandler::default());
        let queue = queue_with(Arc::clone(&handler) as Arc<dyn WebhookHandler>, fast_config());

        queue
            .enqueue("whatsapp", None, json!({"n": 1}), Some(5))
            .await
            .unwrap();
        queue
            .enqueue("sms", None, json!({"n": 2}), Some(1))
            .await
            .unwrap();

        assert!(queue.start_processing());
        wait_until_drained(&queue).await;
        queue.stop_processing();

        let seen = handler.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["sms".to_owned(), "whatsapp".to_owned()]);
    }

    #[tokio::test]
    async fn start_processing_is_idempotent() {
        let queue = queue_with(Arc::new(RecordingHandler::default()), fast_config());
        assert!(queue.start_processing());
        assert!(!queue.start_processing(), "second start must be a no-op");
        queue.stop_processing();
    }

    #[tokio::test]
    async fn item_dead_letters_after_max_attempts() {
        let queue = queue_with(Arc::new(FlakyHandler::failing(u32::MAX)), fast_config());
        let item = queue.enqueue("sms", None, json!({}), None).await.unwrap();

        assert!(queue.start_processing());

        // Wait for the item to reach its terminal state.
        let mut failed = None;
        for _ in 0..500 {
            let current = queue.store.get(item.id).await.unwrap();
            if current.status == QueueItemStatus::Failed {
                failed = Some(current);
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        let failed = failed.expect("item should dead-letter");
        assert_eq!(failed.attempts, 5);
        assert_eq!(failed.last_error.as_deref(), Some("boom"));

        // Terminal means terminal: the loop never auto-retries it.
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        let still = queue.store.get(item.id).await.unwrap();
        assert_eq!(still.status, QueueItemStatus::Failed);
        assert_eq!(still.attempts, 5);

        queue.stop_processing();
        assert_eq!(queue.metrics().snapshot().dead_lettered, 1);
    }

    #[tokio::test]
    async fn flaky_item_recovers_within_attempt_budget() {
        let queue = queue_with(Arc::new(FlakyHandler::failing(2)), fast_config());
        let item = queue.enqueue("sms", None, json!({}), None).await.unwrap();

        assert!(queue.start_processing());
        wait_until_drained(&queue).await;
        queue.stop_processing();

        let done = queue.store.get(item.id).await.unwrap();
        assert_eq!(done.status, QueueItemStatus::Completed);
        assert_eq!(done.attempts, 3, "two failures plus the success");
        assert!(done.processing_time_ms.is_some());
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn handler_timeout_is_an_ordinary_failure() {
        let config = QueueConfig {
            max_attempts: 1,
            handler_timeout_ms: 50,
            ..fast_config()
        };
        let queue = queue_with(
            Arc::new(SlowHandler {
                delay: StdDuration::from_secs(10),
            }),
            config,
        );
        let item = queue.enqueue("sms", None, json!({}), None).await.unwrap();

        assert!(queue.start_processing());
        let mut last = None;
        for _ in 0..200 {
            let current = queue.store.get(item.id).await.unwrap();
            if current.status == QueueItemStatus::Failed {
                last = Some(current);
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        queue.stop_processing();

        let failed = last.expect("timed-out item should fail");
        assert!(failed.last_error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn stop_does_not_abort_the_in_flight_item() {
        let queue = queue_with(
            Arc::new(SlowHandler {
                delay: StdDuration::from_millis(200),
            }),
            fast_config(),
        );
        let item = queue.enqueue("sms", None, json!({}), None).await.unwrap();

        assert!(queue.start_processing());
        // Give the loop time to claim, then stop mid-handler.
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        queue.stop_processing();

        for _ in 0..100 {
            if !queue.is_processing() {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        assert!(!queue.is_processing(), "loop should have stopped");

        let done = queue.store.get(item.id).await.unwrap();
        assert_eq!(
            done.status,
            QueueItemStatus::Completed,
            "in-flight item must complete despite stop"
        );
    }

    #[tokio::test]
    async fn manual_retry_requires_a_failed_item() {
        let queue = queue_with(Arc::new(FlakyHandler::failing(u32::MAX)), QueueConfig {
            max_attempts: 1,
            ..fast_config()
        });
        let item = queue.enqueue("sms", None, json!({}), None).await.unwrap();

        assert!(matches!(
            queue.retry(item.id).await,
            Err(QueueError::InvalidState(_))
        ));
        assert!(matches!(
            queue.retry(9999).await,
            Err(QueueError::NotFound(9999))
        ));

        assert!(queue.start_processing());
        for _ in 0..200 {
            if queue.store.get(item.id).await.unwrap().status == QueueItemStatus::Failed {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        queue.stop_processing();
        for _ in 0..100 {
            if !queue.is_processing() {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }

        let retried = queue.retry(item.id).await.unwrap();
        assert_eq!(retried.status, QueueItemStatus::Pending);
        assert_eq!(retried.attempts, 1, "attempts survive a manual retry");
    }

    #[tokio::test]
    async fn rebalance_penalizes_failing_sources() {
        let handler: Arc<dyn WebhookHandler> = Arc::new(RecordingHandler::default());
        let queue = queue_with(handler, fast_config());

        // Source "flaky-src" accumulates a failure, "steady" a success.
        let flaky = queue.enqueue("flaky-src", None, json!({}), None).await.unwrap();
        let steady = queue.enqueue("steady", None, json!({}), None).await.unwrap();

        let claimed = queue.store.claim_next(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.id, flaky.id);
        queue.store.fail(claimed.id, "permanent").await.unwrap();

        let claimed = queue.store.claim_next(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.id, steady.id);
        queue.store.complete(claimed.id, 50).await.unwrap();

        // Fresh pending items for both sources, equal starting priority.
        let flaky_pending = queue.enqueue("flaky-src", None, json!({}), None).await.unwrap();
        let steady_pending = queue.enqueue("steady", None, json!({}), None).await.unwrap();

        let report = queue.rebalance().await.unwrap();
        assert!(report.count >= 1);

        let flaky_after = queue.store.get(flaky_pending.id).await.unwrap();
        let steady_after = queue.store.get(steady_pending.id).await.unwrap();
        assert!(
            flaky_after.priority > steady_after.priority,
            "failing source must sort after the healthy one"
        );
    }

    #[tokio::test]
    async fn cleanup_reports_deleted_completed_items() {
        let handler: Arc<dyn WebhookHandler> = Arc::new(RecordingHandler::default());
        let queue = queue_with(handler, fast_config());

        let done = queue.enqueue("sms", None, json!({}), None).await.unwrap();
        let claimed = queue.store.claim_next(Utc::now()).await.unwrap().unwrap();
        queue.store.complete(claimed.id, 5).await.unwrap();
        let kept = queue.enqueue("sms", None, json!({}), None).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        let report = queue.cleanup(0).await.unwrap();
        assert_eq!(report.deleted, 1);

        assert!(queue.store.get(kept.id).await.is_ok());
        assert!(queue.store.get(done.id).await.is_err());
    }
}
