use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::Backoff;
use crate::rebalance::RebalanceWeights;

fn default_max_attempts() -> u32 {
    5
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_handler_timeout_ms() -> u64 {
    30_000
}

/// Policy configuration for the webhook queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Attempts before an item is dead-lettered to `failed`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry delay policy.
    #[serde(default)]
    pub backoff: Backoff,

    /// Idle sleep between polls when nothing is eligible, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Bound on a single handler run, in milliseconds. A timeout is an
    /// ordinary processing failure and goes through retry/backoff.
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,

    /// Rebalancing score weights.
    #[serde(default)]
    pub rebalance: RebalanceWeights,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: Backoff::default(),
            poll_interval_ms: default_poll_interval_ms(),
            handler_timeout_ms: default_handler_timeout_ms(),
            rebalance: RebalanceWeights::default(),
        }
    }
}

impl QueueConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }
}
