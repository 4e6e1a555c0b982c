use super::{NewSchedule, ScheduleRecord};
use chrono::NaiveDate;
use thiserror::Error;

/// Failure reported by the schedule API. `Rejected` carries the message the
/// API answered with; callers classify it by substring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(m) | ApiError::Rejected(m) | ApiError::Transport(m) => m,
        }
    }
}

/// Authoritative schedule operations the draft subsystem replays against.
pub trait ScheduleApi {
    fn get_teacher_schedule(
        &self,
        teacher_id: i64,
        week_start: NaiveDate,
    ) -> Result<Vec<ScheduleRecord>, ApiError>;

    fn create_schedule(&self, input: &NewSchedule) -> Result<ScheduleRecord, ApiError>;

    fn delete_schedule(&self, schedule_id: i64) -> Result<(), ApiError>;
}
