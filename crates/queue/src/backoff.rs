use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_base() -> Duration {
    Duration::from_secs(30)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max() -> Duration {
    Duration::from_secs(3600)
}

/// Exponential backoff policy for failed queue items.
///
/// The delay before retry `n` (1-based, the item's attempt count after the
/// failed claim) is `base * multiplier^(n - 1)`, clamped to `max`. Each
/// consecutive failure therefore waits at least as long as the previous
/// one, up to the cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backoff {
    /// Delay after the first failure.
    #[serde(default = "default_base", with = "humantime_secs")]
    pub base: Duration,
    /// Factor applied on each further failure.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Upper bound on the computed delay.
    #[serde(default = "default_max", with = "humantime_secs")]
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: default_base(),
            multiplier: default_multiplier(),
            max: default_max(),
        }
    }
}

impl Backoff {
    /// Compute the delay for the given attempt count (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        // Attempt counts are bounded by max_attempts (single digits in
        // practice), so the i32 conversion cannot wrap.
        #[allow(clippy::cast_possible_wrap)]
        let raw = self.base.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let clamped = raw.min(self.max.as_secs_f64());
        Duration::from_secs_f64(clamped)
    }
}

/// Serialize durations as whole seconds in config files.
mod humantime_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_per_attempt() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay_for(1), Duration::from_secs(30));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(60));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(120));
        assert_eq!(backoff.delay_for(4), Duration::from_secs(240));
    }

    #[test]
    fn delays_are_monotonic_up_to_the_cap() {
        let backoff = Backoff::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..=20 {
            let delay = backoff.delay_for(attempt);
            assert!(delay >= previous, "attempt {attempt} regressed");
            assert!(delay <= backoff.max);
            previous = delay;
        }
        assert_eq!(backoff.delay_for(20), backoff.max);
    }

    #[test]
    fn cap_applies() {
        let backoff = Backoff {
            base: Duration::from_secs(30),
            multiplier: 2.0,
            max: Duration::from_secs(100),
        };
        assert_eq!(backoff.delay_for(3), Duration::from_secs(100));
    }

    #[test]
    fn config_roundtrip() {
        let backoff = Backoff::default();
        let json = serde_json::to_string(&backoff).unwrap();
        let back: Backoff = serde_json::from_str(&json).unwrap();
        assert_eq!(back.base, backoff.base);
        assert_eq!(back.max, backoff.max);
    }
}
