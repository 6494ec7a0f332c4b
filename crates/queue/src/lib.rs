//! Webhook ingestion queue for Talaria.
//!
//! Inbound webhooks are persisted as queue items and processed by a single
//! logical background loop: claim the next eligible item by priority,
//! dispatch it to a source-specific handler, and classify the outcome into
//! completed / retry-with-backoff / dead-lettered. Management operations
//! (status, stats, manual retry, rebalance, cleanup) ride alongside.

pub mod backoff;
pub mod config;
pub mod error;
pub mod handler;
pub mod ingest;
pub mod metrics;
pub mod queue;
pub mod rebalance;

pub use backoff::Backoff;
pub use config::QueueConfig;
pub use error::QueueError;
pub use handler::{HandlerError, HandlerRegistry, WebhookHandler};
pub use ingest::{MessageIngestHandler, PaymentWebhookHandler};
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use queue::{CleanupReport, RebalanceReport, WebhookQueue};
pub use rebalance::{RebalanceWeights, compute_priorities};
