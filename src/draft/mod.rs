//! Client-side staging of weekly schedule edits.
//!
//! A draft collects lesson additions and deletions for exactly one
//! teacher-week. It is overlaid on the authoritative schedule for display
//! (`reconcile`), replayed against the schedule API on save (`commit`), and
//! protected from silent loss on navigation (`guard`).

pub mod commit;
pub mod guard;
pub mod reconcile;
pub mod store;

use crate::dates;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftAddition {
    pub id: String,
    pub teacher_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub day_of_week: i64,
    pub time_slot: String,
    pub week_start: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftDeletion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<i64>,
    pub day_of_week: i64,
    pub time_slot: String,
    pub teacher_id: i64,
    pub week_start: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub teacher_id: i64,
    pub week_start: String,
    #[serde(default)]
    pub additions: Vec<DraftAddition>,
    #[serde(default)]
    pub deletions: Vec<DraftDeletion>,
    #[serde(default)]
    pub has_unsaved_changes: bool,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub last_modified: i64,
}

impl Draft {
    pub fn new(teacher_id: i64, week_start: NaiveDate) -> Self {
        Draft {
            teacher_id,
            week_start: dates::format_iso_date(week_start),
            additions: Vec::new(),
            deletions: Vec::new(),
            has_unsaved_changes: false,
            last_modified: now_millis(),
        }
    }

    pub fn matches_scope(&self, teacher_id: i64, week_start: NaiveDate) -> bool {
        self.teacher_id == teacher_id && self.week_start == dates::format_iso_date(week_start)
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }

    /// Marks an edit. An edit that leaves the draft empty is not unsaved.
    pub fn touch(&mut self) {
        self.has_unsaved_changes = !self.is_empty();
        self.last_modified = now_millis();
    }

    pub fn summary(&self) -> ChangesSummary {
        // A slot both deleted and re-added counts as a modification.
        let modifications = self
            .additions
            .iter()
            .filter(|a| {
                self.deletions
                    .iter()
                    .any(|d| d.day_of_week == a.day_of_week && d.time_slot == a.time_slot)
            })
            .count();
        ChangesSummary {
            additions: self.additions.len(),
            deletions: self.deletions.len(),
            modifications,
            total: self.additions.len() + self.deletions.len(),
            last_modified: self.last_modified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesSummary {
    pub additions: usize,
    pub deletions: usize,
    pub modifications: usize,
    pub total: usize,
    pub last_modified: i64,
}

/// Coordinates of a lesson slot within one teacher-week.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonSlot {
    pub teacher_id: i64,
    pub week_start: NaiveDate,
    pub day_of_week: i64,
    pub time_slot: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LessonData {
    pub slot: LessonSlot,
    pub student_id: i64,
    pub student_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error(
        "a draft with unsaved changes exists for teacher {draft_teacher_id} week {draft_week_start}"
    )]
    ScopeMismatch {
        draft_teacher_id: i64,
        draft_week_start: String,
    },
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn temporary_id() -> String {
    format!("draft-{}", uuid::Uuid::new_v4())
}
