mod test_support;

use chrono::NaiveDate;
use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{create_student, create_teacher, request_err, request_ok, spawn_sidecar, temp_dir};

const WEEK: &str = "2024-06-03";

fn view_week(nav: &serde_json::Value) -> NaiveDate {
    let raw = nav["view"]["weekStart"].as_str().expect("view weekStart");
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("iso date")
}

fn stage_addition(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    teacher_id: i64,
    student_id: i64,
) {
    let _ = request_ok(
        stdin,
        reader,
        id,
        "draft.addLesson",
        json!({
            "teacherId": teacher_id,
            "weekStart": WEEK,
            "dayOfWeek": 0,
            "timeSlot": "9:00-9:30",
            "studentId": student_id
        }),
    );
}

#[test]
fn clean_navigation_is_not_held() {
    let workspace = temp_dir("lessond-nav-clean");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let before = request_ok(&mut stdin, &mut reader, "2", "nav.state", json!({}));
    assert_eq!(before["guard"].as_str(), Some("clean"));

    let moved = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "nav.request",
        json!({ "action": "nextWeek" }),
    );
    assert_eq!(moved["performed"].as_bool(), Some(true));
    assert_eq!(
        view_week(&moved).signed_duration_since(view_week(&before)).num_days(),
        7
    );

    let tab = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "nav.request",
        json!({ "action": "switchTab", "tab": "students" }),
    );
    assert_eq!(tab["view"]["tab"].as_str(), Some("students"));

    let bad = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "nav.request",
        json!({ "action": "jump" }),
    );
    assert_eq!(bad["code"].as_str(), Some("bad_params"));

    let nothing = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "nav.resolve",
        json!({ "choice": "discard" }),
    );
    assert_eq!(nothing["code"].as_str(), Some("no_pending_navigation"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn discard_clears_draft_and_performs_pending_navigation() {
    let workspace = temp_dir("lessond-nav-discard");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let teacher_id = create_teacher(&mut stdin, &mut reader, "2", "Ms Parker");
    let student_id = create_student(&mut stdin, &mut reader, "3", "Emma Wilson");
    stage_addition(&mut stdin, &mut reader, "4", teacher_id, student_id);

    let before = request_ok(&mut stdin, &mut reader, "5", "nav.state", json!({}));
    assert_eq!(before["guard"].as_str(), Some("dirty"));

    let held = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "nav.request",
        json!({ "action": "nextWeek" }),
    );
    assert_eq!(held["performed"].as_bool(), Some(false));
    assert_eq!(held["guard"].as_str(), Some("pendingConfirmation"));
    assert_eq!(held["pendingAction"]["action"].as_str(), Some("nextWeek"));
    assert_eq!(view_week(&held), view_week(&before));

    let resolved = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "nav.resolve",
        json!({ "choice": "discard" }),
    );
    assert_eq!(resolved["guard"].as_str(), Some("clean"));
    assert_eq!(
        resolved["performedAction"]["action"].as_str(),
        Some("nextWeek")
    );
    assert_eq!(
        view_week(&resolved).signed_duration_since(view_week(&before)).num_days(),
        7
    );
    assert_eq!(resolved["hasUnsavedChanges"].as_bool(), Some(false));

    let draft = request_ok(&mut stdin, &mut reader, "8", "draft.get", json!({}));
    assert!(draft["draft"].is_null());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn cancel_keeps_draft_and_view() {
    let workspace = temp_dir("lessond-nav-cancel");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let teacher_id = create_teacher(&mut stdin, &mut reader, "2", "Ms Parker");
    let student_id = create_student(&mut stdin, &mut reader, "3", "Emma Wilson");
    stage_addition(&mut stdin, &mut reader, "4", teacher_id, student_id);

    let before = request_ok(&mut stdin, &mut reader, "5", "nav.state", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "nav.request",
        json!({ "action": "previousWeek" }),
    );
    // A later attempt replaces the one waiting for confirmation.
    let replaced = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "nav.request",
        json!({ "action": "logout" }),
    );
    assert_eq!(replaced["pendingAction"]["action"].as_str(), Some("logout"));

    let cancelled = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "nav.resolve",
        json!({ "choice": "cancel" }),
    );
    assert_eq!(cancelled["guard"].as_str(), Some("dirty"));
    assert!(cancelled["performedAction"].is_null());
    assert!(cancelled["pendingAction"].is_null());
    assert_eq!(view_week(&cancelled), view_week(&before));
    assert_eq!(cancelled["view"]["loggedIn"].as_bool(), Some(true));

    let unsaved = request_ok(&mut stdin, &mut reader, "9", "draft.hasUnsaved", json!({}));
    assert_eq!(unsaved["hasUnsavedChanges"].as_bool(), Some(true));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn save_commits_then_navigates_and_failure_keeps_confirmation_open() {
    let workspace = temp_dir("lessond-nav-save");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let parker = create_teacher(&mut stdin, &mut reader, "2", "Ms Parker");
    let emma = create_student(&mut stdin, &mut reader, "3", "Emma Wilson");
    let liam = create_student(&mut stdin, &mut reader, "4", "Liam Chen");
    let booked = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "schedule.create",
        json!({
            "teacherId": parker,
            "studentId": liam,
            "weekStart": WEEK,
            "dayOfWeek": 0,
            "timeSlot": "9:00-9:30"
        }),
    );
    let booked_id = booked["schedule"]["id"].as_i64().expect("schedule id");

    // Staged onto an occupied slot: the save will be rejected.
    stage_addition(&mut stdin, &mut reader, "6", parker, emma);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "nav.request",
        json!({ "action": "switchTab", "tab": "teachers" }),
    );
    let failed = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "nav.resolve",
        json!({ "choice": "save" }),
    );
    assert_eq!(failed["code"].as_str(), Some("schedule_conflict"));
    let still = request_ok(&mut stdin, &mut reader, "9", "nav.state", json!({}));
    assert_eq!(still["guard"].as_str(), Some("pendingConfirmation"));
    assert_eq!(still["view"]["tab"].as_str(), Some("schedule"));

    // Free the slot out of band and try again.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "schedule.delete",
        json!({ "scheduleId": booked_id }),
    );
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "nav.resolve",
        json!({ "choice": "save" }),
    );
    assert_eq!(saved["guard"].as_str(), Some("clean"));
    assert_eq!(saved["view"]["tab"].as_str(), Some("teachers"));
    assert_eq!(
        saved["report"]["created"].as_array().map(|c| c.len()),
        Some(1)
    );
    assert_eq!(saved["hasUnsavedChanges"].as_bool(), Some(false));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn selecting_a_teacher_is_never_held() {
    let workspace = temp_dir("lessond-nav-select");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let parker = create_teacher(&mut stdin, &mut reader, "2", "Ms Parker");
    let adams = create_teacher(&mut stdin, &mut reader, "3", "Mr Adams");
    let emma = create_student(&mut stdin, &mut reader, "4", "Emma Wilson");
    stage_addition(&mut stdin, &mut reader, "5", parker, emma);

    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "nav.select",
        json!({ "teacherId": adams }),
    );
    assert_eq!(selected["view"]["teacherId"].as_i64(), Some(adams));
    assert_eq!(selected["guard"].as_str(), Some("dirty"));

    let missing = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "nav.select",
        json!({ "teacherId": 9999 }),
    );
    assert_eq!(missing["code"].as_str(), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
