use crate::draft::commit::commit_draft;
use crate::draft::{Draft, LessonData};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    commit_error, draft_error, draft_store, optional_schedule_id, required_i64,
    required_lesson_slot, required_week_start, workspace_parts,
};
use crate::ipc::types::{AppState, Request};
use crate::schedule::repo::ScheduleRepo;
use serde_json::json;

/// Brings the guard in line with the draft after a mutation.
fn sync_guard(state: &mut AppState) {
    let dirty = state.has_unsaved_changes();
    state.guard.sync(dirty);
}

fn handle_init(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher_id = match required_i64(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let week_start = match required_week_start(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let drafts = match draft_store(&mut state.drafts, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let draft = drafts.initialize_draft(teacher_id, week_start);
    let persisted = drafts.is_persisted();
    sync_guard(state);
    ok(&req.id, json!({ "draft": draft, "persisted": persisted }))
}

fn handle_add_lesson(state: &mut AppState, req: &Request) -> serde_json::Value {
    let slot = match required_lesson_slot(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_i64(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (conn, drafts) = match workspace_parts(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let given_name = req
        .params
        .get("studentName")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let student_name = match given_name {
        Some(name) => name,
        None => match ScheduleRepo::new(conn).student_name(student_id) {
            Ok(Some(name)) => name,
            Ok(None) => {
                return err(
                    &req.id,
                    "student_not_found",
                    "Student not found",
                    Some(json!({ "studentId": student_id })),
                )
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
    };

    let lesson = LessonData {
        slot,
        student_id,
        student_name,
    };
    let draft = match drafts.add_lesson(&lesson) {
        Ok(d) => d,
        Err(e) => return draft_error(req, e),
    };
    let persisted = drafts.is_persisted();
    sync_guard(state);
    ok(&req.id, json!({ "draft": draft, "persisted": persisted }))
}

fn handle_delete_lesson(state: &mut AppState, req: &Request) -> serde_json::Value {
    let slot = match required_lesson_slot(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let schedule_id = optional_schedule_id(req);
    let drafts = match draft_store(&mut state.drafts, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let draft = match drafts.delete_lesson(schedule_id, &slot) {
        Ok(d) => d,
        Err(e) => return draft_error(req, e),
    };
    let persisted = drafts.is_persisted();
    sync_guard(state);
    ok(&req.id, json!({ "draft": draft, "persisted": persisted }))
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let drafts = match draft_store(&mut state.drafts, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    ok(&req.id, json!({ "draft": drafts.get_draft_changes() }))
}

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let draft: Draft = match req
        .params
        .get("draft")
        .cloned()
        .map(serde_json::from_value::<Draft>)
    {
        Some(Ok(d)) => d,
        Some(Err(e)) => return err(&req.id, "bad_params", format!("invalid draft: {e}"), None),
        None => return err(&req.id, "bad_params", "missing draft", None),
    };
    let drafts = match draft_store(&mut state.drafts, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let saved = drafts.save_draft_changes(&draft);
    sync_guard(state);
    ok(&req.id, json!({ "saved": saved }))
}

fn handle_for_teacher_week(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher_id = match required_i64(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let week_start = match required_week_start(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let drafts = match draft_store(&mut state.drafts, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({ "draft": drafts.get_changes_for_teacher_week(teacher_id, week_start) }),
    )
}

fn handle_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let drafts = match draft_store(&mut state.drafts, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    ok(&req.id, json!({ "summary": drafts.get_changes_summary() }))
}

fn handle_has_unsaved(state: &mut AppState, req: &Request) -> serde_json::Value {
    let drafts = match draft_store(&mut state.drafts, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({ "hasUnsavedChanges": drafts.has_unsaved_changes() }),
    )
}

fn handle_discard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let drafts = match draft_store(&mut state.drafts, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let cleared = drafts.clear_draft_changes();
    tracing::info!(cleared, "draft discarded");
    sync_guard(state);
    ok(&req.id, json!({ "cleared": cleared }))
}

fn handle_commit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, drafts) = match workspace_parts(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(draft) = drafts.get_draft_changes() else {
        return err(&req.id, "no_draft", "there are no changes to save", None);
    };
    let result = commit_draft(drafts, &ScheduleRepo::new(conn), &draft);
    sync_guard(state);
    match result {
        Ok(report) => ok(&req.id, json!({ "report": report })),
        Err(e) => commit_error(req, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "draft.init" => Some(handle_init(state, req)),
        "draft.addLesson" => Some(handle_add_lesson(state, req)),
        "draft.deleteLesson" => Some(handle_delete_lesson(state, req)),
        "draft.get" => Some(handle_get(state, req)),
        "draft.save" => Some(handle_save(state, req)),
        "draft.forTeacherWeek" => Some(handle_for_teacher_week(state, req)),
        "draft.summary" => Some(handle_summary(state, req)),
        "draft.hasUnsaved" => Some(handle_has_unsaved(state, req)),
        "draft.discard" => Some(handle_discard(state, req)),
        "draft.commit" => Some(handle_commit(state, req)),
        _ => None,
    }
}
