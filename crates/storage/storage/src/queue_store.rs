use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use talaria_core::{NewQueueItem, SourceStats, WebhookQueueItem};

use crate::error::StorageError;

/// Point-in-time item counts, by status.
///
/// The queue combines these with its own loop-running flag into the
/// user-facing status payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: u64,
    pub processing: u64,
    pub failed: u64,
    pub completed: u64,
}

/// Persistence contract for the webhook queue.
///
/// The queue owns item rows exclusively: only the processing loop (through
/// this trait) transitions their status. [`QueueStore::claim_next`] is the
/// one contended operation and must be atomic -- selection of the next
/// eligible pending item and its transition to `processing` happen as a
/// single conditional update, so two loop instances sharing a backing store
/// can never both claim the same item.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Persist a new item in `pending` state, assigning the next id.
    async fn insert(&self, item: NewQueueItem) -> Result<WebhookQueueItem, StorageError>;

    /// Claim the next eligible item: lowest `priority`, then earliest
    /// `process_after`, then lowest `id`, among pending items whose
    /// `process_after <= now`. On success the returned item is already in
    /// `processing` state with `attempts` incremented.
    ///
    /// Returns `Ok(None)` when nothing is eligible.
    async fn claim_next(&self, now: DateTime<Utc>)
    -> Result<Option<WebhookQueueItem>, StorageError>;

    /// Transition a processing item to `completed`, recording the handler
    /// duration and `completed_at`.
    async fn complete(&self, id: u64, processing_time_ms: u64) -> Result<(), StorageError>;

    /// Transition a processing item back to `pending` with a backoff
    /// deadline and the failure cause.
    async fn retry_later(
        &self,
        id: u64,
        process_after: DateTime<Utc>,
        last_error: &str,
    ) -> Result<(), StorageError>;

    /// Dead-letter a processing item: terminal `failed` state.
    async fn fail(&self, id: u64, last_error: &str) -> Result<(), StorageError>;

    /// Force a `failed` item back to `pending` with `process_after = now`,
    /// preserving `attempts`. Conditional: returns
    /// [`StorageError::Conflict`] if the item is not `failed`,
    /// [`StorageError::NotFound`] if the id does not exist.
    async fn retry_failed(&self, id: u64) -> Result<WebhookQueueItem, StorageError>;

    async fn get(&self, id: u64) -> Result<WebhookQueueItem, StorageError>;

    async fn counts(&self) -> Result<QueueCounts, StorageError>;

    /// Per-source statistics over all items currently known to the store.
    async fn stats_by_source(&self) -> Result<Vec<SourceStats>, StorageError>;

    /// Assign a new priority to every *pending* item of each listed source.
    /// Items in any other state are never touched. Returns the number of
    /// items updated.
    async fn reprioritize_pending(
        &self,
        source_priorities: &HashMap<String, i32>,
    ) -> Result<u64, StorageError>;

    /// Delete `completed` items whose `completed_at` is before the cutoff.
    /// Items in any other state are never deleted, regardless of age.
    /// Returns the number of deleted items.
    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}
