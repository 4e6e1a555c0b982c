use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::{json, Value};

use super::error::err;
use super::types::{AppState, LocalDraftStore, Request};
use crate::dates;
use crate::draft::commit::CommitError;
use crate::draft::{DraftError, LessonSlot};

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn draft_store<'a>(
    drafts: &'a mut Option<LocalDraftStore>,
    req: &Request,
) -> Result<&'a mut LocalDraftStore, Value> {
    drafts
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_bool(req: &Request, key: &str) -> Result<bool, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be a boolean", key),
            None,
        )),
    }
}

/// `weekStart` as an ISO date falling on a Monday.
pub fn required_week_start(req: &Request) -> Result<NaiveDate, Value> {
    let raw = required_str(req, "weekStart")?;
    let Some(date) = dates::parse_iso_date(&raw) else {
        return Err(err(
            &req.id,
            "bad_params",
            "weekStart must be YYYY-MM-DD",
            Some(json!({ "weekStart": raw })),
        ));
    };
    if !dates::is_week_start(date) {
        return Err(err(
            &req.id,
            "bad_params",
            "weekStart must be a Monday",
            Some(json!({ "weekStart": raw })),
        ));
    }
    if !dates::is_navigable_week(date) {
        return Err(err(
            &req.id,
            "bad_params",
            "weekStart is out of range",
            Some(json!({ "weekStart": raw })),
        ));
    }
    Ok(date)
}

pub fn required_day(req: &Request) -> Result<i64, Value> {
    let day = required_i64(req, "dayOfWeek")?;
    if !dates::is_valid_day_of_week(day) {
        return Err(err(
            &req.id,
            "bad_params",
            "dayOfWeek must be between 0 and 6",
            Some(json!({ "dayOfWeek": day })),
        ));
    }
    Ok(day)
}

pub fn required_time_slot(req: &Request) -> Result<String, Value> {
    let slot = required_str(req, "timeSlot")?;
    if dates::parse_time_slot(&slot).is_none() {
        return Err(err(
            &req.id,
            "bad_params",
            "timeSlot must be H:MM-H:MM",
            Some(json!({ "timeSlot": slot })),
        ));
    }
    Ok(slot)
}

pub fn required_lesson_slot(req: &Request) -> Result<LessonSlot, Value> {
    Ok(LessonSlot {
        teacher_id: required_i64(req, "teacherId")?,
        week_start: required_week_start(req)?,
        day_of_week: required_day(req)?,
        time_slot: required_time_slot(req)?,
    })
}

/// Persisted lessons carry integer ids. Draft-only ids and a missing id both
/// mean there is nothing on the server to delete.
pub fn optional_schedule_id(req: &Request) -> Option<i64> {
    match req.params.get("scheduleId") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn draft_error(req: &Request, e: DraftError) -> Value {
    match &e {
        DraftError::ScopeMismatch {
            draft_teacher_id,
            draft_week_start,
        } => err(
            &req.id,
            "draft_scope_mismatch",
            e.to_string(),
            Some(json!({
                "teacherId": draft_teacher_id,
                "weekStart": draft_week_start,
            })),
        ),
    }
}

pub fn commit_error(req: &Request, e: &CommitError) -> Value {
    err(
        &req.id,
        e.kind.code(),
        e.user_message(),
        Some(json!({
            "step": e.step,
            "applied": e.applied,
            "remaining": e.remaining,
            "partial": e.is_partial(),
            "error": e.source.message(),
        })),
    )
}

/// Database and draft store borrowed together.
pub fn workspace_parts<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<(&'a Connection, &'a mut LocalDraftStore), Value> {
    match (state.db.as_ref(), state.drafts.as_mut()) {
        (Some(conn), Some(drafts)) => Ok((conn, drafts)),
        _ => Err(err(&req.id, "no_workspace", "select a workspace first", None)),
    }
}
