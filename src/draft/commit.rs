use super::store::DraftStore;
use super::Draft;
use crate::dates;
use crate::schedule::api::{ApiError, ScheduleApi};
use crate::schedule::{NewSchedule, ScheduleRecord};
use crate::storage::KeyValueStore;
use serde::Serialize;
use thiserror::Error;

pub const MSG_SAVE_FAILED: &str = "Failed to save changes.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    Validation,
    TeacherConflict,
    StudentNotFound,
    SlotConflict,
    Transport,
    Other,
}

impl FailureKind {
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::Validation => "validation_failed",
            FailureKind::TeacherConflict => "teacher_conflict",
            FailureKind::StudentNotFound => "student_not_found",
            FailureKind::SlotConflict => "schedule_conflict",
            FailureKind::Transport => "network_error",
            FailureKind::Other => "commit_failed",
        }
    }
}

/// Sorts an API failure into the categories the UI reports differently.
pub fn classify(e: &ApiError) -> FailureKind {
    match e {
        ApiError::Validation(_) => FailureKind::Validation,
        ApiError::Transport(_) => FailureKind::Transport,
        ApiError::Rejected(m) if m.contains("assigned to another teacher") => {
            FailureKind::TeacherConflict
        }
        ApiError::Rejected(m) if m.contains("Student not found") => FailureKind::StudentNotFound,
        ApiError::Rejected(m) if m.contains("Conflict") => FailureKind::SlotConflict,
        ApiError::Rejected(_) => FailureKind::Other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CommitStep {
    Addition { index: usize },
    Deletion { index: usize },
}

/// First failing operation of a commit. Operations before it stay applied and
/// the draft is left as it was.
#[derive(Debug, Clone, Error)]
#[error("failed to save changes at {step:?}: {source}")]
pub struct CommitError {
    pub step: CommitStep,
    pub kind: FailureKind,
    pub applied: usize,
    pub remaining: usize,
    #[source]
    pub source: ApiError,
}

impl CommitError {
    pub fn is_partial(&self) -> bool {
        self.applied > 0
    }

    pub fn user_message(&self) -> String {
        match self.kind {
            FailureKind::Validation => self.source.message().to_string(),
            FailureKind::TeacherConflict => {
                "This student is already booked with another teacher at this time.".to_string()
            }
            FailureKind::StudentNotFound => {
                "Student not found. Please refresh and try again.".to_string()
            }
            FailureKind::SlotConflict => {
                "This time slot is already booked. Please choose another slot.".to_string()
            }
            FailureKind::Transport => {
                "Network error. Please check your connection and try again.".to_string()
            }
            FailureKind::Other => MSG_SAVE_FAILED.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub created: Vec<ScheduleRecord>,
    pub deleted: Vec<i64>,
    pub cleared: bool,
    /// Authoritative schedule fetched after the draft was cleared.
    pub refreshed: Option<Vec<ScheduleRecord>>,
}

fn missing_schedule_id() -> ApiError {
    ApiError::Validation("Missing required field: scheduleId".to_string())
}

/// Replays `draft` against `api`: additions in order, then deletions in order,
/// one call at a time. Stops at the first failure. On full success the draft
/// is cleared and the teacher-week is fetched again.
pub fn commit_draft<S, A>(
    store: &mut DraftStore<S>,
    api: &A,
    draft: &Draft,
) -> Result<CommitReport, CommitError>
where
    S: KeyValueStore,
    A: ScheduleApi + ?Sized,
{
    let total = draft.additions.len() + draft.deletions.len();
    let mut applied = 0usize;
    let fail = |step: CommitStep, applied: usize, source: ApiError| {
        let e = CommitError {
            step,
            kind: classify(&source),
            applied,
            remaining: total - applied,
            source,
        };
        tracing::warn!(
            step = ?e.step,
            applied = e.applied,
            remaining = e.remaining,
            error = %e.source,
            "draft commit stopped"
        );
        e
    };

    // A deletion without a record id can never succeed; refuse before any write.
    if let Some(index) = draft.deletions.iter().position(|d| d.schedule_id.is_none()) {
        return Err(fail(
            CommitStep::Deletion { index },
            applied,
            missing_schedule_id(),
        ));
    }

    let mut created = Vec::with_capacity(draft.additions.len());
    for (index, addition) in draft.additions.iter().enumerate() {
        let input = NewSchedule {
            student_id: addition.student_id,
            teacher_id: addition.teacher_id,
            day_of_week: addition.day_of_week,
            time_slot: addition.time_slot.clone(),
            week_start_date: addition.week_start.clone(),
        };
        match api.create_schedule(&input) {
            Ok(record) => {
                created.push(record);
                applied += 1;
            }
            Err(e) => return Err(fail(CommitStep::Addition { index }, applied, e)),
        }
    }

    let mut deleted = Vec::with_capacity(draft.deletions.len());
    for (index, deletion) in draft.deletions.iter().enumerate() {
        let step = CommitStep::Deletion { index };
        let Some(schedule_id) = deletion.schedule_id else {
            return Err(fail(step, applied, missing_schedule_id()));
        };
        if let Err(e) = api.delete_schedule(schedule_id) {
            return Err(fail(step, applied, e));
        }
        deleted.push(schedule_id);
        applied += 1;
    }

    let cleared = store.clear_draft_changes();
    tracing::info!(
        teacher_id = draft.teacher_id,
        week_start = %draft.week_start,
        created = created.len(),
        deleted = deleted.len(),
        "draft committed"
    );

    let refreshed = match dates::parse_iso_date(&draft.week_start) {
        Some(week_start) => match api.get_teacher_schedule(draft.teacher_id, week_start) {
            Ok(rows) => Some(rows),
            Err(e) => {
                tracing::warn!(error = %e, "schedule refresh after commit failed");
                None
            }
        },
        None => None,
    };

    Ok(CommitReport {
        created,
        deleted,
        cleared,
        refreshed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::store::tests::{lesson, slot, week};
    use crate::schedule::STATUS_SCHEDULED;
    use crate::storage::MemoryStorage;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Records every call; answers from a script keyed by call position.
    #[derive(Default)]
    struct ScriptedApi {
        calls: RefCell<Vec<String>>,
        failures: HashMap<usize, ApiError>,
        next_id: RefCell<i64>,
    }

    impl ScriptedApi {
        fn failing_at(call: usize, e: ApiError) -> Self {
            let mut api = ScriptedApi::default();
            api.failures.insert(call, e);
            api
        }

        fn record_call(&self, call: String) -> Result<(), ApiError> {
            let mut calls = self.calls.borrow_mut();
            let position = calls.len();
            calls.push(call);
            match self.failures.get(&position) {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    impl ScheduleApi for ScriptedApi {
        fn get_teacher_schedule(
            &self,
            teacher_id: i64,
            _week_start: NaiveDate,
        ) -> Result<Vec<ScheduleRecord>, ApiError> {
            self.record_call(format!("get {}", teacher_id))?;
            Ok(Vec::new())
        }

        fn create_schedule(&self, input: &NewSchedule) -> Result<ScheduleRecord, ApiError> {
            self.record_call(format!("create {} {}", input.day_of_week, input.time_slot))?;
            let mut next = self.next_id.borrow_mut();
            *next += 1;
            Ok(ScheduleRecord {
                id: *next,
                student_id: input.student_id,
                student_name: String::new(),
                teacher_id: input.teacher_id,
                day_of_week: input.day_of_week,
                time_slot: input.time_slot.clone(),
                week_start_date: input.week_start_date.clone(),
                attendance_status: STATUS_SCHEDULED.to_string(),
            })
        }

        fn delete_schedule(&self, schedule_id: i64) -> Result<(), ApiError> {
            self.record_call(format!("delete {}", schedule_id))
        }
    }

    fn staged_store() -> DraftStore<MemoryStorage> {
        let mut store = DraftStore::new(MemoryStorage::default());
        store
            .add_lesson(&lesson(5, 0, "9:00-9:30", 1, "Emma Wilson"))
            .expect("a1");
        store
            .add_lesson(&lesson(5, 1, "9:00-9:30", 2, "James Brown"))
            .expect("a2");
        store
            .delete_lesson(Some(42), &slot(5, 2, "14:00-14:30"))
            .expect("d1");
        store
    }

    #[test]
    fn full_success_clears_draft_and_refetches() {
        let mut store = staged_store();
        let draft = store.get_draft_changes().expect("draft");
        let api = ScriptedApi::default();

        let report = commit_draft(&mut store, &api, &draft).expect("commit");
        assert_eq!(
            *api.calls.borrow(),
            vec![
                "create 0 9:00-9:30",
                "create 1 9:00-9:30",
                "delete 42",
                "get 5"
            ]
        );
        assert_eq!(report.created.len(), 2);
        assert_eq!(report.deleted, vec![42]);
        assert!(report.cleared);
        assert!(report.refreshed.is_some());
        assert!(store.get_draft_changes().is_none());
        assert!(!store.has_unsaved_changes());
    }

    #[test]
    fn first_failure_stops_and_keeps_draft() {
        let mut store = staged_store();
        let draft = store.get_draft_changes().expect("draft");
        let api = ScriptedApi::failing_at(
            0,
            ApiError::Rejected("Conflict: time slot is already booked".to_string()),
        );

        let e = commit_draft(&mut store, &api, &draft).unwrap_err();
        assert_eq!(*api.calls.borrow(), vec!["create 0 9:00-9:30"]);
        assert_eq!(e.step, CommitStep::Addition { index: 0 });
        assert_eq!(e.kind, FailureKind::SlotConflict);
        assert_eq!(e.applied, 0);
        assert_eq!(e.remaining, 3);
        assert!(!e.is_partial());
        assert_eq!(store.get_draft_changes(), Some(draft));
    }

    #[test]
    fn failure_midway_is_partial() {
        let mut store = staged_store();
        let draft = store.get_draft_changes().expect("draft");
        let api = ScriptedApi::failing_at(2, ApiError::Transport("connection reset".to_string()));

        let e = commit_draft(&mut store, &api, &draft).unwrap_err();
        assert_eq!(e.step, CommitStep::Deletion { index: 0 });
        assert_eq!(e.kind, FailureKind::Transport);
        assert_eq!(e.applied, 2);
        assert!(e.is_partial());
        assert_eq!(
            e.user_message(),
            "Network error. Please check your connection and try again."
        );
        assert!(store.has_unsaved_changes());
    }

    #[test]
    fn deletion_without_schedule_id_is_a_validation_failure() {
        let mut store = DraftStore::new(MemoryStorage::default());
        store
            .delete_lesson(None, &slot(5, 2, "14:00-14:30"))
            .expect("d");
        let draft = store.get_draft_changes().expect("draft");
        let api = ScriptedApi::default();

        let e = commit_draft(&mut store, &api, &draft).unwrap_err();
        assert!(api.calls.borrow().is_empty());
        assert_eq!(e.kind, FailureKind::Validation);
        assert_eq!(e.user_message(), "Missing required field: scheduleId");
    }

    #[test]
    fn deletion_without_schedule_id_is_refused_before_any_addition() {
        let mut store = DraftStore::new(MemoryStorage::default());
        store
            .add_lesson(&lesson(5, 0, "9:00-9:30", 1, "Emma Wilson"))
            .expect("a");
        store
            .delete_lesson(Some(42), &slot(5, 1, "10:00-10:30"))
            .expect("d1");
        store
            .delete_lesson(None, &slot(5, 2, "14:00-14:30"))
            .expect("d2");
        let draft = store.get_draft_changes().expect("draft");
        let api = ScriptedApi::default();

        let e = commit_draft(&mut store, &api, &draft).unwrap_err();
        assert!(api.calls.borrow().is_empty());
        assert_eq!(e.step, CommitStep::Deletion { index: 1 });
        assert_eq!(e.kind, FailureKind::Validation);
        assert_eq!(e.applied, 0);
        assert_eq!(e.remaining, 3);
        assert!(!e.is_partial());
        assert_eq!(store.get_draft_changes(), Some(draft));
    }

    #[test]
    fn classify_matches_message_substrings() {
        let rejected = |m: &str| ApiError::Rejected(m.to_string());
        assert_eq!(
            classify(&rejected("Student is already assigned to another teacher at this time")),
            FailureKind::TeacherConflict
        );
        assert_eq!(
            classify(&rejected("Student not found")),
            FailureKind::StudentNotFound
        );
        assert_eq!(
            classify(&rejected("Conflict: time slot is already booked")),
            FailureKind::SlotConflict
        );
        assert_eq!(classify(&rejected("Teacher not found")), FailureKind::Other);
        assert_eq!(
            classify(&ApiError::Validation("Missing required field: time_slot".to_string())),
            FailureKind::Validation
        );
    }

    #[test]
    fn empty_draft_commits_trivially() {
        let mut store = DraftStore::new(MemoryStorage::default());
        let draft = store.initialize_draft(5, week());
        let api = ScriptedApi::default();
        let report = commit_draft(&mut store, &api, &draft).expect("commit");
        assert!(report.created.is_empty());
        assert!(store.get_draft_changes().is_none());
    }
}
