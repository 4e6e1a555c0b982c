use super::reconcile::{apply_draft_to_schedule, ReconcileOptions};
use super::{temporary_id, ChangesSummary, Draft, DraftAddition, DraftDeletion, DraftError, LessonData, LessonSlot};
use crate::dates;
use crate::schedule::{ReconciledItem, ScheduleRecord};
use crate::storage::{KeyValueStore, StorageError};
use chrono::NaiveDate;

/// Well-known key of the serialized draft in local storage.
pub const DRAFT_STORAGE_KEY: &str = "scheduleDraftChanges";

/// Process-wide holder of the single active draft.
///
/// The logical draft lives in memory; every mutation is written through to
/// `storage` on a best-effort basis. While the last write succeeded the
/// persisted copy is authoritative and re-read on every access, so changes
/// made to the store out of band are picked up. After a failed write the
/// in-memory draft is served until a later write succeeds.
pub struct DraftStore<S: KeyValueStore> {
    storage: S,
    current: Option<Draft>,
    in_sync: bool,
}

impl<S: KeyValueStore> DraftStore<S> {
    pub fn new(storage: S) -> Self {
        let mut store = DraftStore {
            storage,
            current: None,
            in_sync: true,
        };
        store.current = store.load_persisted().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unable to read persisted draft");
            None
        });
        store
    }

    /// Whether the persisted draft reflects the in-memory one.
    pub fn is_persisted(&self) -> bool {
        self.in_sync
    }

    fn load_persisted(&self) -> Result<Option<Draft>, StorageError> {
        let Some(raw) = self.storage.get_item(DRAFT_STORAGE_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Draft>(&raw) {
            Ok(d) => Ok(Some(d)),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable persisted draft");
                Ok(None)
            }
        }
    }

    fn persist(&mut self) -> bool {
        let result = match &self.current {
            Some(draft) => match serde_json::to_string(draft) {
                Ok(raw) => self.storage.set_item(DRAFT_STORAGE_KEY, &raw),
                Err(e) => Err(StorageError::Unavailable(e.to_string())),
            },
            None => self.storage.remove_item(DRAFT_STORAGE_KEY),
        };
        match result {
            Ok(()) => {
                self.in_sync = true;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "draft persistence failed; keeping in-memory copy");
                self.in_sync = false;
                false
            }
        }
    }

    pub fn initialize_draft(&mut self, teacher_id: i64, week_start: NaiveDate) -> Draft {
        let draft = Draft::new(teacher_id, week_start);
        self.save_draft_changes(&draft);
        tracing::debug!(teacher_id, week_start = %draft.week_start, "draft initialized");
        draft
    }

    pub fn get_draft_changes(&mut self) -> Option<Draft> {
        if self.in_sync {
            match self.load_persisted() {
                Ok(d) => {
                    self.current = d;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "unable to read persisted draft; using in-memory copy");
                }
            }
        }
        self.current.clone()
    }

    pub fn save_draft_changes(&mut self, draft: &Draft) -> bool {
        self.current = Some(draft.clone());
        self.persist()
    }

    pub fn clear_draft_changes(&mut self) -> bool {
        self.current = None;
        self.persist()
    }

    pub fn has_unsaved_changes(&mut self) -> bool {
        self.get_draft_changes()
            .map(|d| d.has_unsaved_changes)
            .unwrap_or(false)
    }

    pub fn get_changes_for_teacher_week(
        &mut self,
        teacher_id: i64,
        week_start: NaiveDate,
    ) -> Option<Draft> {
        self.get_draft_changes()
            .filter(|d| d.matches_scope(teacher_id, week_start))
    }

    pub fn get_changes_summary(&mut self) -> Option<ChangesSummary> {
        self.get_draft_changes().map(|d| d.summary())
    }

    /// Draft to mutate for `slot`, creating one when none exists. A draft for
    /// another scope is replaced only when it holds no unsaved changes.
    fn draft_for(&mut self, slot: &LessonSlot) -> Result<Draft, DraftError> {
        match self.get_draft_changes() {
            None => Ok(self.initialize_draft(slot.teacher_id, slot.week_start)),
            Some(d) if d.matches_scope(slot.teacher_id, slot.week_start) => Ok(d),
            Some(d) if !d.has_unsaved_changes || d.is_empty() => {
                Ok(self.initialize_draft(slot.teacher_id, slot.week_start))
            }
            Some(d) => Err(DraftError::ScopeMismatch {
                draft_teacher_id: d.teacher_id,
                draft_week_start: d.week_start,
            }),
        }
    }

    pub fn add_lesson(&mut self, lesson: &LessonData) -> Result<Draft, DraftError> {
        let mut draft = self.draft_for(&lesson.slot)?;
        let week_start = dates::format_iso_date(lesson.slot.week_start);

        let existing = draft.additions.iter_mut().find(|a| {
            a.day_of_week == lesson.slot.day_of_week && a.time_slot == lesson.slot.time_slot
        });
        match existing {
            Some(a) => {
                a.teacher_id = lesson.slot.teacher_id;
                a.student_id = lesson.student_id;
                a.student_name = lesson.student_name.clone();
                a.week_start = week_start;
            }
            None => draft.additions.push(DraftAddition {
                id: temporary_id(),
                teacher_id: lesson.slot.teacher_id,
                student_id: lesson.student_id,
                student_name: lesson.student_name.clone(),
                day_of_week: lesson.slot.day_of_week,
                time_slot: lesson.slot.time_slot.clone(),
                week_start,
            }),
        }

        draft.touch();
        self.save_draft_changes(&draft);
        Ok(draft)
    }

    /// Removes the lesson at `slot`. A pending addition at the slot is
    /// retracted (matched by coordinate, `schedule_id` is not consulted);
    /// otherwise a deletion of `schedule_id` is staged.
    pub fn delete_lesson(
        &mut self,
        schedule_id: Option<i64>,
        slot: &LessonSlot,
    ) -> Result<Draft, DraftError> {
        let mut draft = self.draft_for(slot)?;

        let before = draft.additions.len();
        draft
            .additions
            .retain(|a| !(a.day_of_week == slot.day_of_week && a.time_slot == slot.time_slot));
        let retracted = draft.additions.len() != before;

        if !retracted {
            let already_staged = draft
                .deletions
                .iter()
                .any(|d| d.day_of_week == slot.day_of_week && d.time_slot == slot.time_slot);
            if !already_staged {
                draft.deletions.push(DraftDeletion {
                    schedule_id,
                    day_of_week: slot.day_of_week,
                    time_slot: slot.time_slot.clone(),
                    teacher_id: slot.teacher_id,
                    week_start: dates::format_iso_date(slot.week_start),
                });
            }
        }

        draft.touch();
        self.save_draft_changes(&draft);
        Ok(draft)
    }

    /// Overlays the draft for `(teacher_id, week_start)`, if any, on `original`.
    pub fn apply_to_schedule(
        &mut self,
        original: &[ScheduleRecord],
        teacher_id: i64,
        week_start: NaiveDate,
        opts: ReconcileOptions,
    ) -> Vec<ReconciledItem> {
        let draft = self.get_draft_changes();
        apply_draft_to_schedule(original, draft.as_ref(), teacher_id, week_start, opts)
    }
}
