use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use talaria_core::{NewQueueItem, QueueItemStatus, SourceStats, WebhookQueueItem};
use talaria_storage::{QueueCounts, QueueStore, StorageError};

/// In-memory [`QueueStore`] backed by a [`DashMap`].
///
/// The claim path is claim-and-verify: a candidate is selected by scanning,
/// then transitioned under the entry lock only if it is still eligible. A
/// lost race simply rescans, so concurrent claimers never hold the same
/// item.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    items: DashMap<u64, WebhookQueueItem>,
    next_id: AtomicU64,
}

impl MemoryQueueStore {
    /// Create a new, empty in-memory queue store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the id of the best eligible candidate: lowest priority number,
    /// then earliest `process_after`, then lowest id.
    fn best_candidate(&self, now: DateTime<Utc>) -> Option<u64> {
        self.items
            .iter()
            .filter(|entry| entry.value().is_eligible(now))
            .min_by_key(|entry| {
                let item = entry.value();
                (item.priority, item.process_after, item.id)
            })
            .map(|entry| *entry.key())
    }

    fn with_processing_item<F>(&self, id: u64, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut WebhookQueueItem),
    {
        let mut entry = self
            .items
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("queue item {id}")))?;
        if entry.status != QueueItemStatus::Processing {
            return Err(StorageError::Conflict(format!(
                "queue item {id} is {:?}, expected processing",
                entry.status
            )));
        }
        f(entry.value_mut());
        entry.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn insert(&self, item: NewQueueItem) -> Result<WebhookQueueItem, StorageError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let stored = WebhookQueueItem {
            id,
            source: item.source,
            channel_id: item.channel_id,
            payload: item.payload,
            status: QueueItemStatus::Pending,
            attempts: 0,
            last_error: None,
            process_after: now,
            priority: item.priority,
            tags: item.tags,
            batch_id: item.batch_id,
            processing_time_ms: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.items.insert(id, stored.clone());
        Ok(stored)
    }

    async fn claim_next(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<WebhookQueueItem>, StorageError> {
        loop {
            let Some(candidate_id) = self.best_candidate(now) else {
                return Ok(None);
            };

            // Re-verify under the entry lock: another claimer may have won
            // the race between the scan and this lookup.
            if let Some(mut entry) = self.items.get_mut(&candidate_id) {
                if entry.is_eligible(now) {
                    entry.status = QueueItemStatus::Processing;
                    entry.attempts += 1;
                    entry.updated_at = Utc::now();
                    return Ok(Some(entry.clone()));
                }
            }
            // Candidate vanished or was claimed; rescan.
        }
    }

    async fn complete(&self, id: u64, processing_time_ms: u64) -> Result<(), StorageError> {
        self.with_processing_item(id, |item| {
            item.status = QueueItemStatus::Completed;
            item.processing_time_ms = Some(processing_time_ms);
            item.completed_at = Some(Utc::now());
        })
    }

    async fn retry_later(
        &self,
        id: u64,
        process_after: DateTime<Utc>,
        last_error: &str,
    ) -> Result<(), StorageError> {
        self.with_processing_item(id, |item| {
            item.status = QueueItemStatus::Pending;
            item.process_after = process_after;
            item.last_error = Some(last_error.to_owned());
        })
    }

    async fn fail(&self, id: u64, last_error: &str) -> Result<(), StorageError> {
        self.with_processing_item(id, |item| {
            item.status = QueueItemStatus::Failed;
            item.last_error = Some(last_error.to_owned());
        })
    }

    async fn retry_failed(&self, id: u64) -> Result<WebhookQueueItem, StorageError> {
        let mut entry = self
            .items
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("queue item {id}")))?;
        if entry.status != QueueItemStatus::Failed {
            return Err(StorageError::Conflict(format!(
                "queue item {id} is {:?}, only failed items can be retried",
                entry.status
            )));
        }
        entry.status = QueueItemStatus::Pending;
        entry.process_after = Utc::now();
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn get(&self, id: u64) -> Result<WebhookQueueItem, StorageError> {
        self.items
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StorageError::NotFound(format!("queue item {id}")))
    }

    async fn counts(&self) -> Result<QueueCounts, StorageError> {
        let mut counts = QueueCounts::default();
        for entry in &self.items {
            match entry.status {
                QueueItemStatus::Pending => counts.pending += 1,
                QueueItemStatus::Processing => counts.processing += 1,
                QueueItemStatus::Failed => counts.failed += 1,
                QueueItemStatus::Completed => counts.completed += 1,
            }
        }
        Ok(counts)
    }

    #[allow(clippy::cast_precision_loss)]
    async fn stats_by_source(&self) -> Result<Vec<SourceStats>, StorageError> {
        #[derive(Default)]
        struct Accumulator {
            pending: u64,
            processing: u64,
            completed: u64,
            failed: u64,
            total_time_ms: u64,
            timed_items: u64,
        }

        let mut by_source: HashMap<String, Accumulator> = HashMap::new();
        for entry in &self.items {
            let acc = by_source.entry(entry.source.clone()).or_default();
            match entry.status {
                QueueItemStatus::Pending => acc.pending += 1,
                QueueItemStatus::Processing => acc.processing += 1,
                QueueItemStatus::Failed => acc.failed += 1,
                QueueItemStatus::Completed => acc.completed += 1,
            }
            if let Some(ms) = entry.processing_time_ms {
                acc.total_time_ms += ms;
                acc.timed_items += 1;
            }
        }

        let mut stats: Vec<SourceStats> = by_source
            .into_iter()
            .map(|(source, acc)| SourceStats {
                source,
                pending: acc.pending,
                processing: acc.processing,
                completed: acc.completed,
                failed: acc.failed,
                avg_processing_time_ms: (acc.timed_items > 0)
                    .then(|| acc.total_time_ms as f64 / acc.timed_items as f64),
            })
            .collect();
        stats.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(stats)
    }

    async fn reprioritize_pending(
        &self,
        source_priorities: &HashMap<String, i32>,
    ) -> Result<u64, StorageError> {
        let mut updated = 0;
        for mut entry in self.items.iter_mut() {
            if entry.status != QueueItemStatus::Pending {
                continue;
            }
            if let Some(&priority) = source_priorities.get(&entry.source) {
                if entry.priority != priority {
                    entry.priority = priority;
                    entry.updated_at = Utc::now();
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let before = self.items.len() as u64;
        self.items.retain(|_, item| {
            !(item.status == QueueItemStatus::Completed
                && item.completed_at.is_some_and(|at| at < cutoff))
        });
        Ok(before - self.items.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use talaria_storage::testing::run_queue_store_conformance_tests;

    #[tokio::test]
    async fn conformance() {
        let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
        run_queue_store_conformance_tests(store)
            .await
            .expect("memory queue store must pass conformance");
    }

    #[tokio::test]
    async fn stats_average_only_counts_timed_items() {
        let store = MemoryQueueStore::new();
        store
            .insert(NewQueueItem::new("whatsapp", serde_json::json!({})))
            .await
            .unwrap();
        let claimed = store.claim_next(Utc::now()).await.unwrap().unwrap();
        store.complete(claimed.id, 40).await.unwrap();

        store
            .insert(NewQueueItem::new("whatsapp", serde_json::json!({})))
            .await
            .unwrap();
        let claimed = store.claim_next(Utc::now()).await.unwrap().unwrap();
        store.complete(claimed.id, 20).await.unwrap();

        let stats = store.stats_by_source().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].completed, 2);
        assert_eq!(stats[0].avg_processing_time_ms, Some(30.0));
    }
}
