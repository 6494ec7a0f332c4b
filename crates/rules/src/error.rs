use thiserror::Error;

/// Validation errors for schedule configuration.
///
/// Evaluation itself never errors: a rule against an unknown field is a
/// non-match, a broken cron expression is never due. Validation exists so
/// the API can reject misconfigured automations at write time instead.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("interval must be at least one minute")]
    ZeroInterval,

    #[error("schedule target {0} requires a target_id")]
    MissingTargetId(String),
}
