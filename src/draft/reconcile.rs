use super::Draft;
use crate::dates;
use crate::schedule::{ItemId, ReconciledItem, ScheduleRecord, SlotKey, STATUS_SCHEDULED};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Keep items hit by a staged deletion in the view, flagged `is_deleted`,
    /// instead of dropping them.
    pub keep_deleted: bool,
}

/// Overlays `draft` on the authoritative `original` schedule.
///
/// Identity when the draft is absent or scoped to another teacher-week.
/// Deletions apply first and match by slot coordinate, then each addition is
/// appended as a provisional item. Neither input is modified.
pub fn apply_draft_to_schedule(
    original: &[ScheduleRecord],
    draft: Option<&Draft>,
    teacher_id: i64,
    week_start: NaiveDate,
    opts: ReconcileOptions,
) -> Vec<ReconciledItem> {
    let mut items: Vec<ReconciledItem> = original.iter().cloned().map(Into::into).collect();
    let Some(draft) = draft.filter(|d| d.matches_scope(teacher_id, week_start)) else {
        return items;
    };

    for deletion in &draft.deletions {
        let hit = |item: &ReconciledItem| {
            item.day_of_week == deletion.day_of_week && item.time_slot == deletion.time_slot
        };
        if opts.keep_deleted {
            for item in items.iter_mut().filter(|it| hit(it)) {
                item.is_deleted = true;
            }
        } else {
            items.retain(|it| !hit(it));
        }
    }

    let week_start_date = dates::format_iso_date(week_start);
    for addition in &draft.additions {
        items.push(ReconciledItem {
            id: ItemId::Draft(addition.id.clone()),
            student_id: addition.student_id,
            student_name: addition.student_name.clone(),
            teacher_id: addition.teacher_id,
            day_of_week: addition.day_of_week,
            time_slot: addition.time_slot.clone(),
            week_start_date: week_start_date.clone(),
            attendance_status: STATUS_SCHEDULED.to_string(),
            is_draft: true,
            is_deleted: false,
        });
    }

    items
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleDeletion {
    pub day_of_week: i64,
    pub time_slot: String,
    pub staged_schedule_id: i64,
    pub current_schedule_id: i64,
}

/// Staged deletions whose slot is now occupied by a different record than
/// the one they were raised against. Coordinate matching would remove the
/// new occupant.
pub fn stale_deletions(original: &[ScheduleRecord], draft: &Draft) -> Vec<StaleDeletion> {
    let mut out = Vec::new();
    for deletion in &draft.deletions {
        let Some(staged) = deletion.schedule_id else {
            continue;
        };
        let slot = SlotKey::new(deletion.day_of_week, deletion.time_slot.clone());
        for record in original.iter().filter(|r| r.slot() == slot) {
            if record.id != staged {
                out.push(StaleDeletion {
                    day_of_week: deletion.day_of_week,
                    time_slot: deletion.time_slot.clone(),
                    staged_schedule_id: staged,
                    current_schedule_id: record.id,
                });
            }
        }
    }
    out
}
