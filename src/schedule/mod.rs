pub mod api;
pub mod repo;
pub mod setup;

use serde::{Deserialize, Serialize};

pub const STATUS_SCHEDULED: &str = "scheduled";
pub const STATUS_PRESENT: &str = "present";
pub const STATUS_ABSENT: &str = "absent";
pub const STATUS_CANCELLED: &str = "cancelled";

pub fn validate_attendance_status(s: &str) -> bool {
    matches!(
        s,
        STATUS_SCHEDULED | STATUS_PRESENT | STATUS_ABSENT | STATUS_CANCELLED
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub day_of_week: i64,
    pub time_slot: String,
}

impl SlotKey {
    pub fn new(day_of_week: i64, time_slot: impl Into<String>) -> Self {
        SlotKey {
            day_of_week,
            time_slot: time_slot.into(),
        }
    }
}

/// Authoritative lesson record as served by the schedule API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub teacher_id: i64,
    pub day_of_week: i64,
    pub time_slot: String,
    pub week_start_date: String,
    pub attendance_status: String,
}

impl ScheduleRecord {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.day_of_week, self.time_slot.clone())
    }
}

/// Body of a create-schedule call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSchedule {
    pub student_id: i64,
    pub teacher_id: i64,
    pub day_of_week: i64,
    pub time_slot: String,
    pub week_start_date: String,
}

/// Identifier of an item in the reconciled view. Draft additions only carry a
/// temporary string id until they are committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Record(i64),
    Draft(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledItem {
    pub id: ItemId,
    pub student_id: i64,
    pub student_name: String,
    pub teacher_id: i64,
    pub day_of_week: i64,
    pub time_slot: String,
    pub week_start_date: String,
    pub attendance_status: String,
    pub is_draft: bool,
    pub is_deleted: bool,
}

impl From<ScheduleRecord> for ReconciledItem {
    fn from(r: ScheduleRecord) -> Self {
        ReconciledItem {
            id: ItemId::Record(r.id),
            student_id: r.student_id,
            student_name: r.student_name,
            teacher_id: r.teacher_id,
            day_of_week: r.day_of_week,
            time_slot: r.time_slot,
            week_start_date: r.week_start_date,
            attendance_status: r.attendance_status,
            is_draft: false,
            is_deleted: false,
        }
    }
}
