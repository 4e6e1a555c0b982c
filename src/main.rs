mod config;
mod dates;
mod db;
mod draft;
mod ipc;
mod logging;
mod schedule;
mod storage;

use serde_json::json;
use std::io::{self, BufRead, Write};

fn main() {
    let cfg = config::Config::from_env();
    if let Err(e) = logging::init_logging(&cfg.log_level, &cfg.log_format) {
        eprintln!("lessond: {e}");
    }

    let mut state = ipc::AppState::new();
    if let Some(path) = cfg.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::error!(workspace = %path.display(), error = ?e, "unable to open workspace");
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lessond ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                tracing::warn!(error = %e, "malformed request line");
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
