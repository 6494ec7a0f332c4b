use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default priority assigned to items enqueued without an explicit one.
///
/// Lower numbers are processed first; the rebalancer recomputes pending
/// priorities from this base plus per-source penalties.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Lifecycle state of a queued webhook item.
///
/// Transitions: `Pending -> Processing -> {Completed | Pending (retry) |
/// Failed}`. `Failed` is terminal until an operator retries the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    /// Waiting to be picked up (possibly delayed by `process_after`).
    Pending,
    /// Claimed by the processing loop; exactly one worker may hold this.
    Processing,
    /// Retries exhausted; requires a manual retry.
    Failed,
    /// Handled successfully.
    Completed,
}

/// A durably queued inbound webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WebhookQueueItem {
    /// Monotonically increasing identifier, assigned at enqueue time.
    /// Doubles as the FIFO tie-breaker within a priority band.
    pub id: u64,

    /// Tag identifying the producer (a channel type or payment provider).
    pub source: String,

    /// Optional reference to a channel configuration.
    pub channel_id: Option<String>,

    /// Raw webhook body.
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub payload: serde_json::Value,

    /// Current lifecycle state.
    pub status: QueueItemStatus,

    /// Number of processing attempts so far.
    pub attempts: u32,

    /// Last error message recorded on failure.
    pub last_error: Option<String>,

    /// The item must not be picked up before this instant (backoff delay).
    pub process_after: DateTime<Utc>,

    /// Lower value processed first among eligible pending items.
    pub priority: i32,

    /// Free-form labels, not required for correctness.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Optional batch correlation id.
    #[serde(default)]
    pub batch_id: Option<String>,

    /// Wall-clock duration of the successful handler run.
    #[serde(default)]
    pub processing_time_ms: Option<u64>,

    /// When the item was enqueued.
    pub created_at: DateTime<Utc>,

    /// When the item was last transitioned.
    pub updated_at: DateTime<Utc>,

    /// When the item completed, if it did.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WebhookQueueItem {
    /// Returns `true` if the processing loop may claim this item now.
    #[must_use]
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == QueueItemStatus::Pending && self.process_after <= now
    }
}

/// Input for enqueueing a new webhook item.
///
/// The store assigns `id`, timestamps, and the initial `Pending` status.
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub source: String,
    pub channel_id: Option<String>,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub tags: Vec<String>,
    pub batch_id: Option<String>,
}

impl NewQueueItem {
    /// Create an item with the default priority and no metadata.
    #[must_use]
    pub fn new(source: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            source: source.into(),
            channel_id: None,
            payload,
            priority: DEFAULT_PRIORITY,
            tags: Vec::new(),
            batch_id: None,
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QueueStatus {
    pub pending: u64,
    pub processing: u64,
    pub failed: u64,
    /// Whether the background loop is currently running.
    pub is_processing: bool,
}

/// Per-source throughput and failure statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SourceStats {
    pub source: String,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    /// Mean handler duration across completed items, if any completed.
    pub avg_processing_time_ms: Option<f64>,
}

impl SourceStats {
    /// Fraction of finished items that failed, in `[0.0, 1.0]`.
    ///
    /// Sources with nothing finished yet score 0 so rebalancing leaves
    /// them at the base priority.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn failure_rate(&self) -> f64 {
        let finished = self.completed + self.failed;
        if finished == 0 {
            0.0
        } else {
            self.failed as f64 / finished as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(status: QueueItemStatus, process_after: DateTime<Utc>) -> WebhookQueueItem {
        let now = Utc::now();
        WebhookQueueItem {
            id: 1,
            source: "whatsapp".into(),
            channel_id: None,
            payload: serde_json::json!({}),
            status,
            attempts: 0,
            last_error: None,
            process_after,
            priority: DEFAULT_PRIORITY,
            tags: Vec::new(),
            batch_id: None,
            processing_time_ms: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn pending_item_with_elapsed_delay_is_eligible() {
        let now = Utc::now();
        let it = item(QueueItemStatus::Pending, now - chrono::Duration::seconds(1));
        assert!(it.is_eligible(now));
    }

    #[test]
    fn delayed_item_is_not_eligible() {
        let now = Utc::now();
        let it = item(QueueItemStatus::Pending, now + chrono::Duration::seconds(30));
        assert!(!it.is_eligible(now));
    }

    #[test]
    fn non_pending_item_is_not_eligible() {
        let now = Utc::now();
        for status in [
            QueueItemStatus::Processing,
            QueueItemStatus::Failed,
            QueueItemStatus::Completed,
        ] {
            let it = item(status, now - chrono::Duration::seconds(1));
            assert!(!it.is_eligible(now), "{status:?} must not be eligible");
        }
    }

    #[test]
    fn failure_rate_ignores_unfinished_work() {
        let stats = SourceStats {
            source: "sms".into(),
            pending: 12,
            processing: 1,
            completed: 3,
            failed: 1,
            avg_processing_time_ms: None,
        };
        assert!((stats.failure_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&QueueItemStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }
}
