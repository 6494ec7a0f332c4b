//! Automation execution for Talaria.
//!
//! The [`AutomationService`] decides which automations fire for an inbound
//! message or a schedule tick; the [`AutomationExecutor`] runs one
//! automation's type-specific strategy; the [`ActionRunner`] performs the
//! side-effecting steps. Collaborator failures never escape the executor:
//! they come back as failed [`AutomationResult`](talaria_core::AutomationResult)s.

pub mod actions;
pub mod context;
pub mod error;
pub mod executor;
pub mod forward;
pub mod scheduler;
pub mod service;

pub use actions::{ActionRunner, WebhookOptions};
pub use context::{AutomationContext, ContextBuilder};
pub use error::ExecutionError;
pub use executor::AutomationExecutor;
pub use forward::OutboundForwarder;
pub use scheduler::{ScheduleRunner, ScheduleRunnerConfig};
pub use service::AutomationService;
