//! Conformance test suite for [`QueueStore`] implementations.
//!
//! Call [`run_queue_store_conformance_tests`] from a backend's test module
//! with a fresh store instance. The suite exercises the ordering, claim
//! atomicity, and cleanup-safety guarantees every backend must provide.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};

use talaria_core::{NewQueueItem, QueueItemStatus};

use crate::error::StorageError;
use crate::queue_store::QueueStore;

/// Run the full queue store conformance test suite.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_queue_store_conformance_tests(
    store: Arc<dyn QueueStore>,
) -> Result<(), StorageError> {
    test_insert_assigns_increasing_ids(store.as_ref()).await?;
    test_claim_respects_priority(store.as_ref()).await?;
    test_claim_respects_process_after(store.as_ref()).await?;
    test_claim_breaks_ties_fifo(store.as_ref()).await?;
    test_claim_increments_attempts(store.as_ref()).await?;
    test_concurrent_claims_are_exclusive(Arc::clone(&store)).await?;
    test_retry_failed_is_conditional(store.as_ref()).await?;
    test_cleanup_only_removes_completed(store.as_ref()).await?;
    test_reprioritize_only_touches_pending(store.as_ref()).await?;
    Ok(())
}

fn item(source: &str, priority: i32) -> NewQueueItem {
    NewQueueItem::new(source, serde_json::json!({"event": "test"})).with_priority(priority)
}

async fn drain(store: &dyn QueueStore) -> Result<(), StorageError> {
    // Claim and complete everything eligible so each test starts clean.
    let now = Utc::now();
    while let Some(claimed) = store.claim_next(now).await? {
        store.complete(claimed.id, 1).await?;
    }
    store.delete_completed_before(Utc::now() + Duration::days(1)).await?;
    Ok(())
}

async fn test_insert_assigns_increasing_ids(store: &dyn QueueStore) -> Result<(), StorageError> {
    let first = store.insert(item("conformance-ids", 10)).await?;
    let second = store.insert(item("conformance-ids", 10)).await?;
    assert!(second.id > first.id, "ids must be monotonically increasing");
    assert_eq!(first.status, QueueItemStatus::Pending);
    assert_eq!(first.attempts, 0);
    drain(store).await
}

async fn test_claim_respects_priority(store: &dyn QueueStore) -> Result<(), StorageError> {
    let low_urgency = store.insert(item("whatsapp", 5)).await?;
    let high_urgency = store.insert(item("sms", 1)).await?;

    let first = store.claim_next(Utc::now()).await?.expect("claimable item");
    assert_eq!(first.id, high_urgency.id, "lower priority number goes first");
    assert_eq!(first.status, QueueItemStatus::Processing);

    let second = store.claim_next(Utc::now()).await?.expect("claimable item");
    assert_eq!(second.id, low_urgency.id);

    store.complete(first.id, 1).await?;
    store.complete(second.id, 1).await?;
    drain(store).await
}

async fn test_claim_respects_process_after(store: &dyn QueueStore) -> Result<(), StorageError> {
    let delayed = store.insert(item("delayed", 1)).await?;
    let claimed = store.claim_next(Utc::now()).await?.expect("claimable item");
    store
        .retry_later(claimed.id, Utc::now() + Duration::hours(1), "boom")
        .await?;

    let next = store.claim_next(Utc::now()).await?;
    assert!(
        next.is_none(),
        "item {} with future process_after must not be claimable",
        delayed.id
    );

    // Claimable again once the clock passes the deadline.
    let later = Utc::now() + Duration::hours(2);
    let reclaimed = store.claim_next(later).await?.expect("claimable after deadline");
    assert_eq!(reclaimed.id, delayed.id);
    store.complete(reclaimed.id, 1).await?;
    drain(store).await
}

async fn test_claim_breaks_ties_fifo(store: &dyn QueueStore) -> Result<(), StorageError> {
    let older = store.insert(item("fifo", 3)).await?;
    let newer = store.insert(item("fifo", 3)).await?;

    let first = store.claim_next(Utc::now()).await?.expect("claimable item");
    assert_eq!(first.id, older.id, "equal priority resolves FIFO by id");
    let second = store.claim_next(Utc::now()).await?.expect("claimable item");
    assert_eq!(second.id, newer.id);

    store.complete(first.id, 1).await?;
    store.complete(second.id, 1).await?;
    drain(store).await
}

async fn test_claim_increments_attempts(store: &dyn QueueStore) -> Result<(), StorageError> {
    let inserted = store.insert(item("attempts", 1)).await?;
    let claimed = store.claim_next(Utc::now()).await?.expect("claimable item");
    assert_eq!(claimed.id, inserted.id);
    assert_eq!(claimed.attempts, 1, "claim must count as an attempt");

    store.retry_later(claimed.id, Utc::now(), "first failure").await?;
    let reclaimed = store.claim_next(Utc::now()).await?.expect("claimable item");
    assert_eq!(reclaimed.attempts, 2);
    assert_eq!(reclaimed.last_error.as_deref(), Some("first failure"));

    store.complete(reclaimed.id, 1).await?;
    drain(store).await
}

async fn test_concurrent_claims_are_exclusive(
    store: Arc<dyn QueueStore>,
) -> Result<(), StorageError> {
    for _ in 0..4 {
        store.insert(item("contended", 1)).await?;
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.claim_next(Utc::now()).await
        }));
    }

    let mut claimed_ids = HashSet::new();
    for handle in handles {
        let result = handle.await.expect("claim task should not panic")?;
        if let Some(claimed) = result {
            assert!(
                claimed_ids.insert(claimed.id),
                "item {} was claimed twice",
                claimed.id
            );
        }
    }
    assert_eq!(claimed_ids.len(), 4, "all four items claimed exactly once");

    for id in claimed_ids {
        store.complete(id, 1).await?;
    }
    drain(store.as_ref()).await
}

async fn test_retry_failed_is_conditional(store: &dyn QueueStore) -> Result<(), StorageError> {
    let inserted = store.insert(item("retry", 1)).await?;

    // Pending items cannot be force-retried.
    let conflict = store.retry_failed(inserted.id).await;
    assert!(matches!(conflict, Err(StorageError::Conflict(_))));

    let claimed = store.claim_next(Utc::now()).await?.expect("claimable item");
    store.fail(claimed.id, "handler exploded").await?;

    let retried = store.retry_failed(inserted.id).await?;
    assert_eq!(retried.status, QueueItemStatus::Pending);
    assert_eq!(retried.attempts, claimed.attempts, "attempts preserved");
    assert!(retried.process_after <= Utc::now());

    let missing = store.retry_failed(u64::MAX).await;
    assert!(matches!(missing, Err(StorageError::NotFound(_))));

    drain(store).await
}

async fn test_cleanup_only_removes_completed(store: &dyn QueueStore) -> Result<(), StorageError> {
    let pending = store.insert(item("cleanup", 5)).await?;
    let completed = store.insert(item("cleanup", 1)).await?;
    let failed = store.insert(item("cleanup", 2)).await?;

    let first = store.claim_next(Utc::now()).await?.expect("claimable item");
    assert_eq!(first.id, completed.id);
    store.complete(first.id, 10).await?;

    let second = store.claim_next(Utc::now()).await?.expect("claimable item");
    assert_eq!(second.id, failed.id);
    store.fail(second.id, "permanent").await?;

    // Cutoff far in the future: everything is "old enough".
    let deleted = store
        .delete_completed_before(Utc::now() + Duration::days(1))
        .await?;
    assert_eq!(deleted, 1, "only the completed item may be deleted");

    assert!(store.get(pending.id).await.is_ok());
    assert!(store.get(failed.id).await.is_ok());
    assert!(matches!(
        store.get(completed.id).await,
        Err(StorageError::NotFound(_))
    ));

    store.retry_failed(failed.id).await?;
    drain(store).await
}

async fn test_reprioritize_only_touches_pending(
    store: &dyn QueueStore,
) -> Result<(), StorageError> {
    let pending = store.insert(item("noisy", 10)).await?;
    let processing = store.insert(item("noisy", 1)).await?;

    let claimed = store.claim_next(Utc::now()).await?.expect("claimable item");
    assert_eq!(claimed.id, processing.id);

    let mut priorities = HashMap::new();
    priorities.insert("noisy".to_owned(), 42);
    let updated = store.reprioritize_pending(&priorities).await?;
    assert_eq!(updated, 1);

    assert_eq!(store.get(pending.id).await?.priority, 42);
    assert_eq!(
        store.get(processing.id).await?.priority,
        1,
        "in-flight items keep their priority"
    );

    store.complete(claimed.id, 1).await?;
    drain(store).await
}
