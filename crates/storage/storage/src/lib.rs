//! Storage trait abstractions for Talaria.
//!
//! Two collaborator contracts live here: [`Storage`] for CRM records
//! (automations, conversations, contacts, channels, messages) and
//! [`QueueStore`] for webhook queue items. Both are object-safe async
//! traits; backends implement them against any persistence engine.

pub mod error;
pub mod queue_store;
pub mod store;
pub mod testing;

pub use error::StorageError;
pub use queue_store::{QueueCounts, QueueStore};
pub use store::{AutomationUpdate, ContactUpdate, ConversationFilter, Storage};
