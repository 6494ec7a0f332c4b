//! Core domain types for the Talaria automation engine.
//!
//! This crate is dependency-light on purpose: every other crate in the
//! workspace builds on these types, so nothing here performs I/O or holds
//! runtime state.

pub mod action;
pub mod automation;
pub mod channel;
pub mod contact;
pub mod conversation;
pub mod message;
pub mod notification;
pub mod queue;
pub mod result;
pub mod rule;
pub mod schedule;

pub use action::{ActionConfig, WebhookMethod};
pub use automation::{Automation, AutomationType, ResponseTemplate, TriggerConfig};
pub use channel::Channel;
pub use contact::Contact;
pub use conversation::{Conversation, ConversationStatus};
pub use message::{Message, MessageDirection, NewMessage};
pub use notification::NewNotification;
pub use queue::{
    DEFAULT_PRIORITY, NewQueueItem, QueueItemStatus, QueueStatus, SourceStats, WebhookQueueItem,
};
pub use result::AutomationResult;
pub use rule::{RuleCombinator, RuleExpr, RuleOperator};
pub use schedule::{ScheduleCadence, ScheduleConfig, ScheduleTarget};
