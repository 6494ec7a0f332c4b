//! Due-checks for scheduled automations.
//!
//! Pure functions over the automation record and the current time, so the
//! schedule runner can be driven by a paused test clock.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use talaria_core::{Automation, ScheduleCadence, ScheduleConfig, ScheduleTarget};

use crate::error::ScheduleError;

/// Returns `true` iff the automation's schedule indicates "due now".
///
/// A run marks `last_executed_at`, which anchors the next due window:
/// calling this again inside the same window returns `false`, so a
/// schedule never re-fires until its cadence elapses.
#[must_use]
pub fn schedule_is_due(automation: &Automation, now: DateTime<Utc>) -> bool {
    let Some(schedule) = &automation.schedule else {
        return false;
    };
    cadence_is_due(
        &schedule.cadence,
        automation.last_executed_at,
        automation.created_at,
        now,
    )
}

fn cadence_is_due(
    cadence: &ScheduleCadence,
    last_executed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    match cadence {
        ScheduleCadence::Interval { minutes } => {
            let Some(last) = last_executed_at else {
                // Never ran: due on the first check.
                return true;
            };
            last + Duration::minutes(i64::from(*minutes)) <= now
        }
        ScheduleCadence::Cron { expr, timezone } => {
            // The anchor is the last execution, or creation for a fresh
            // automation; due once the first cron tick after the anchor
            // has passed.
            let anchor = last_executed_at.unwrap_or(created_at);
            match next_cron_occurrence(expr, timezone, anchor) {
                Some(next) => next <= now,
                None => false,
            }
        }
    }
}

/// Compute the next cron occurrence strictly after `after`.
///
/// Returns `None` (never due) when the expression or timezone is invalid;
/// validation at write time is supposed to keep that from happening.
#[must_use]
pub fn next_cron_occurrence(
    expr: &str,
    timezone: &str,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let cron = match croner::Cron::new(expr).parse() {
        Ok(cron) => cron,
        Err(e) => {
            warn!(expr = %expr, error = %e, "unparseable cron expression in schedule");
            return None;
        }
    };
    let tz: chrono_tz::Tz = match timezone.parse() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(timezone = %timezone, "unknown timezone in schedule");
            return None;
        }
    };
    let after_tz = after.with_timezone(&tz);
    cron.find_next_occurrence(&after_tz, false)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Validate a schedule configuration at write time.
pub fn validate_schedule(config: &ScheduleConfig) -> Result<(), ScheduleError> {
    match &config.cadence {
        ScheduleCadence::Interval { minutes } => {
            if *minutes == 0 {
                return Err(ScheduleError::ZeroInterval);
            }
        }
        ScheduleCadence::Cron { expr, timezone } => {
            croner::Cron::new(expr)
                .parse()
                .map_err(|e| ScheduleError::InvalidCron(format!("{e}")))?;
            timezone
                .parse::<chrono_tz::Tz>()
                .map_err(|_| ScheduleError::InvalidTimezone(timezone.clone()))?;
        }
    }

    match config.target {
        ScheduleTarget::Conversation | ScheduleTarget::Contact if config.target_id.is_none() => {
            Err(ScheduleError::MissingTargetId(
                format!("{:?}", config.target).to_lowercase(),
            ))
        }
        _ => Ok(()),
    }
}
