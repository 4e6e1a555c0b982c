use crate::dates;
use crate::draft::commit::{commit_draft, CommitError, CommitReport};
use crate::draft::guard::{Choice, NavAction};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{commit_error, db_conn, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::schedule::repo::ScheduleRepo;
use serde_json::json;

fn nav_snapshot(state: &mut AppState) -> serde_json::Value {
    let has_unsaved = state.has_unsaved_changes();
    json!({
        "view": state.view,
        "guard": state.guard.state().name(),
        "pendingAction": state.guard.pending_action(),
        "hasUnsavedChanges": has_unsaved,
    })
}

fn handle_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(drafts) = state.drafts.as_mut() {
        let dirty = drafts.has_unsaved_changes();
        state.guard.sync(dirty);
    }
    ok(&req.id, nav_snapshot(state))
}

fn handle_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher_id = match required_i64(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match ScheduleRepo::new(conn).teacher_exists(teacher_id) {
        Ok(true) => {}
        Ok(false) => {
            return err(
                &req.id,
                "not_found",
                "Teacher not found",
                Some(json!({ "teacherId": teacher_id })),
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    // Not guarded: a draft for another teacher stays stored but hidden.
    state.view.teacher_id = Some(teacher_id);
    ok(&req.id, nav_snapshot(state))
}

fn handle_request(state: &mut AppState, req: &Request) -> serde_json::Value {
    let action: NavAction = match serde_json::from_value(req.params.clone()) {
        Ok(a) => a,
        Err(e) => return err(&req.id, "bad_params", format!("invalid action: {e}"), None),
    };
    let has_unsaved = state.has_unsaved_changes();
    let performed = match state.guard.attempt(action.clone(), has_unsaved) {
        Some(action) => {
            state.view.apply(&action, dates::current_week_start());
            tracing::debug!(?action, "navigation performed");
            true
        }
        None => false,
    };
    let mut result = nav_snapshot(state);
    result["performed"] = json!(performed);
    result["action"] = json!(action);
    ok(&req.id, result)
}

fn handle_resolve(state: &mut AppState, req: &Request) -> serde_json::Value {
    let raw = match required_str(req, "choice") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(choice) = Choice::parse(&raw) else {
        return err(
            &req.id,
            "bad_params",
            "choice must be one of: save, discard, cancel",
            Some(json!({ "choice": raw })),
        );
    };
    if state.guard.pending_action().is_none() {
        return err(
            &req.id,
            "no_pending_navigation",
            "no navigation is waiting for confirmation",
            None,
        );
    }

    let AppState {
        db,
        drafts,
        guard,
        view,
        ..
    } = state;
    let (Some(conn), Some(store)) = (db.as_ref(), drafts.as_mut()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut report: Option<CommitReport> = None;
    let performed = match choice {
        Choice::Save => {
            let saved: Result<Option<NavAction>, CommitError> =
                guard.save(|| match store.get_draft_changes() {
                    Some(draft) => commit_draft(store, &ScheduleRepo::new(conn), &draft)
                        .map(|r| report = Some(r)),
                    None => Ok(()),
                });
            match saved {
                Ok(action) => action,
                Err(e) => return commit_error(req, &e),
            }
        }
        Choice::Discard => guard.discard(|| {
            if !store.clear_draft_changes() {
                tracing::warn!("discarded draft could not be removed from local storage");
            }
        }),
        Choice::Cancel => {
            guard.cancel();
            None
        }
    };

    if let Some(action) = &performed {
        view.apply(action, dates::current_week_start());
        tracing::debug!(?action, ?choice, "pending navigation resolved");
    }

    let mut result = nav_snapshot(state);
    result["choice"] = json!(raw);
    result["performedAction"] = json!(performed);
    result["report"] = json!(report);
    ok(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "nav.state" => Some(handle_state(state, req)),
        "nav.select" => Some(handle_select(state, req)),
        "nav.request" => Some(handle_request(state, req)),
        "nav.resolve" => Some(handle_resolve(state, req)),
        _ => None,
    }
}
