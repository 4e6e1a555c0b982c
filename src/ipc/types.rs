use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::dates;
use crate::draft::guard::{NavigationGuard, ViewState};
use crate::draft::store::DraftStore;
use crate::storage::KeyValueStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub type LocalDraftStore = DraftStore<Box<dyn KeyValueStore>>;

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub drafts: Option<LocalDraftStore>,
    pub guard: NavigationGuard,
    pub view: ViewState,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            workspace: None,
            db: None,
            drafts: None,
            guard: NavigationGuard::default(),
            view: ViewState::new(dates::current_week_start()),
        }
    }

    /// Dirty flag of the active draft; false without a workspace.
    pub fn has_unsaved_changes(&mut self) -> bool {
        self.drafts
            .as_mut()
            .map(|d| d.has_unsaved_changes())
            .unwrap_or(false)
    }
}
