use crate::db;
use crate::draft::store::DraftStore;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::storage::{KeyValueStore, LocalStorage, MemoryStorage};
use serde_json::json;
use std::path::{Path, PathBuf};

fn open_draft_storage(path: &Path) -> Box<dyn KeyValueStore> {
    match db::open_local_storage(path) {
        Ok(conn) => Box::new(LocalStorage::new(conn)),
        Err(e) => {
            // Drafts still work for this session, they just won't survive a restart.
            tracing::warn!(error = %e, "local storage unavailable; drafts kept in memory");
            Box::new(MemoryStorage::default())
        }
    }
}

/// Opens the workspace database and the draft store next to it. A persisted
/// draft brings the view back to its teacher-week.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    let mut drafts = DraftStore::new(open_draft_storage(path));

    let restored = drafts.get_draft_changes();
    if let Some(draft) = &restored {
        if let Some(week_start) = crate::dates::parse_iso_date(&draft.week_start) {
            state.view.teacher_id = Some(draft.teacher_id);
            state.view.week_start = week_start;
        }
        tracing::info!(
            teacher_id = draft.teacher_id,
            week_start = %draft.week_start,
            unsaved = draft.has_unsaved_changes,
            "restored draft"
        );
    }

    state.guard = Default::default();
    state
        .guard
        .sync(restored.map(|d| d.has_unsaved_changes).unwrap_or(false));
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    state.drafts = Some(drafts);
    tracing::info!(workspace = %path.display(), "workspace opened");
    Ok(())
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "view": state.view,
                "guard": state.guard.state().name(),
            }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
