use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::action::ActionConfig;

/// What a scheduled automation runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ScheduleTarget {
    /// A single conversation, named by `target_id`.
    Conversation,
    /// A single contact, named by `target_id`.
    Contact,
    /// Every open conversation.
    All,
}

/// When a scheduled automation is due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleCadence {
    /// Fixed interval since the last execution.
    Interval {
        /// Minimum minutes between runs.
        minutes: u32,
    },
    /// Standard 5-field cron expression, evaluated in `timezone`.
    Cron {
        expr: String,
        #[serde(default = "default_timezone")]
        timezone: String,
    },
}

fn default_timezone() -> String {
    "UTC".to_owned()
}

/// Schedule configuration of a `scheduled` automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ScheduleConfig {
    pub target: ScheduleTarget,

    /// Required when `target` is `Conversation` or `Contact`.
    #[serde(default)]
    pub target_id: Option<String>,

    pub cadence: ScheduleCadence,

    /// Extra variables merged into the template context for this run.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = HashMap<String, Object>))]
    pub variables: HashMap<String, serde_json::Value>,

    /// Side-effecting actions executed in order on each due run.
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}
