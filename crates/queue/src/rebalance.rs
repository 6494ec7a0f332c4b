//! Priority rebalancing.
//!
//! Sources that fail more or process slower get numerically higher (lower
//! precedence) priorities for their pending items, so healthy sources are
//! drained first. The scoring function is monotonic in both failure rate
//! and average processing time, and deterministic given a stats snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use talaria_core::{DEFAULT_PRIORITY, SourceStats};

fn default_base_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_failure_weight() -> f64 {
    20.0
}

fn default_latency_divisor_ms() -> f64 {
    500.0
}

fn default_max_latency_penalty() -> i32 {
    10
}

/// Weights of the rebalance scoring function.
///
/// `priority = base + round(failure_rate * failure_weight)
///            + min(avg_ms / latency_divisor_ms, max_latency_penalty)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceWeights {
    #[serde(default = "default_base_priority")]
    pub base_priority: i32,
    #[serde(default = "default_failure_weight")]
    pub failure_weight: f64,
    #[serde(default = "default_latency_divisor_ms")]
    pub latency_divisor_ms: f64,
    #[serde(default = "default_max_latency_penalty")]
    pub max_latency_penalty: i32,
}

impl Default for RebalanceWeights {
    fn default() -> Self {
        Self {
            base_priority: default_base_priority(),
            failure_weight: default_failure_weight(),
            latency_divisor_ms: default_latency_divisor_ms(),
            max_latency_penalty: default_max_latency_penalty(),
        }
    }
}

/// Compute the new per-source priorities from a stats snapshot.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn compute_priorities(
    stats: &[SourceStats],
    weights: &RebalanceWeights,
) -> HashMap<String, i32> {
    stats
        .iter()
        .map(|source| {
            let failure_penalty =
                (source.failure_rate() * weights.failure_weight).round() as i32;
            let latency_penalty = source
                .avg_processing_time_ms
                .map_or(0, |avg_ms| {
                    ((avg_ms / weights.latency_divisor_ms).floor() as i32)
                        .min(weights.max_latency_penalty)
                });
            (
                source.source.clone(),
                weights.base_priority + failure_penalty + latency_penalty,
            )
        })
        .collect()
}
