//! Rule evaluation and schedule due-checks for Talaria.
//!
//! Everything here is pure: rules evaluate against a JSON context snapshot,
//! schedules against the automation record and an explicit `now`. Failures
//! to resolve (unknown field, broken regex, unparseable cron) degrade to
//! non-match / never-due instead of erroring, so a single misconfigured
//! automation cannot take down an evaluation batch.

pub mod engine;
pub mod error;
pub mod schedule;

pub use engine::{evaluate_rule, evaluate_rules, lookup_path};
pub use error::ScheduleError;
pub use schedule::{next_cron_occurrence, schedule_is_due, validate_schedule};
