use crate::dates;
use crate::draft::commit::classify;
use crate::draft::reconcile::{stale_deletions, ReconcileOptions};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, optional_bool, required_day, required_i64, required_str, required_time_slot,
    required_week_start, workspace_parts,
};
use crate::ipc::types::{AppState, Request};
use crate::schedule::api::{ApiError, ScheduleApi};
use crate::schedule::repo::ScheduleRepo;
use crate::schedule::{setup, validate_attendance_status, NewSchedule};
use serde_json::json;

fn api_error(req: &Request, e: &ApiError) -> serde_json::Value {
    err(&req.id, classify(e).code(), e.message(), None)
}

fn handle_week(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher_id = match required_i64(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let week_start = match required_week_start(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let keep_deleted = match optional_bool(req, "showDeleted") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (conn, drafts) = match workspace_parts(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let repo = ScheduleRepo::new(conn);
    let original = match repo.get_teacher_schedule(teacher_id, week_start) {
        Ok(rows) => rows,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let grid = match setup::load(conn) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let draft = drafts.get_changes_for_teacher_week(teacher_id, week_start);
    let stale = draft
        .as_ref()
        .map(|d| stale_deletions(&original, d))
        .unwrap_or_default();
    for s in &stale {
        tracing::warn!(
            day_of_week = s.day_of_week,
            time_slot = %s.time_slot,
            staged = s.staged_schedule_id,
            current = s.current_schedule_id,
            "staged deletion no longer matches the lesson in its slot"
        );
    }
    let items = drafts.apply_to_schedule(
        &original,
        teacher_id,
        week_start,
        ReconcileOptions { keep_deleted },
    );
    let week_dates: Vec<String> = dates::week_dates(week_start)
        .into_iter()
        .map(dates::format_iso_date)
        .collect();

    ok(
        &req.id,
        json!({
            "teacherId": teacher_id,
            "weekStart": dates::format_iso_date(week_start),
            "weekDates": week_dates,
            "timeSlots": grid.time_slots(),
            "items": items,
            "hasDraft": draft.is_some(),
            "summary": draft.as_ref().map(|d| d.summary()),
            "staleDeletions": stale,
        }),
    )
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let input = NewSchedule {
        student_id: match required_i64(req, "studentId") {
            Ok(v) => v,
            Err(e) => return e,
        },
        teacher_id: match required_i64(req, "teacherId") {
            Ok(v) => v,
            Err(e) => return e,
        },
        day_of_week: match required_day(req) {
            Ok(v) => v,
            Err(e) => return e,
        },
        time_slot: match required_time_slot(req) {
            Ok(v) => v,
            Err(e) => return e,
        },
        week_start_date: match required_week_start(req) {
            Ok(v) => dates::format_iso_date(v),
            Err(e) => return e,
        },
    };
    match ScheduleRepo::new(conn).create_schedule(&input) {
        Ok(record) => ok(&req.id, json!({ "schedule": record })),
        Err(e) => api_error(req, &e),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let schedule_id = match required_i64(req, "scheduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match ScheduleRepo::new(conn).delete_schedule(schedule_id) {
        Ok(()) => ok(&req.id, json!({ "deleted": schedule_id })),
        Err(ApiError::Rejected(m)) => err(&req.id, "not_found", m, None),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_set_attendance(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let schedule_id = match required_i64(req, "scheduleId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let status = match required_str(req, "status") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if !validate_attendance_status(&status) {
        return err(
            &req.id,
            "bad_params",
            "status must be one of: scheduled, present, absent, cancelled",
            Some(json!({ "status": status })),
        );
    }
    match ScheduleRepo::new(conn).set_attendance(schedule_id, &status) {
        Ok(true) => ok(&req.id, json!({ "scheduleId": schedule_id, "status": status })),
        Ok(false) => err(&req.id, "not_found", "schedule not found", None),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_time_slots(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match setup::load(conn) {
        Ok(s) => ok(&req.id, json!({ "timeSlots": s.time_slots() })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match setup::load(conn) {
        Ok(s) => ok(&req.id, json!({ "schedule": s.to_json() })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match setup::load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = setup::merge_patch(&mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = setup::save(conn, &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "schedule": current.to_json() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.week" => Some(handle_week(state, req)),
        "schedule.create" => Some(handle_create(state, req)),
        "schedule.delete" => Some(handle_delete(state, req)),
        "schedule.setAttendance" => Some(handle_set_attendance(state, req)),
        "schedule.timeSlots" => Some(handle_time_slots(state, req)),
        "schedule.setup.get" => Some(handle_setup_get(state, req)),
        "schedule.setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
