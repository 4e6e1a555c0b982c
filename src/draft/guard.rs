use crate::dates;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TAB: &str = "schedule";

/// Navigation that may be held back while a draft has unsaved changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum NavAction {
    PreviousWeek,
    NextWeek,
    CurrentWeek,
    SwitchTab { tab: String },
    Logout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Clean,
    Dirty,
    PendingConfirmation(NavAction),
}

impl GuardState {
    pub fn name(&self) -> &'static str {
        match self {
            GuardState::Clean => "clean",
            GuardState::Dirty => "dirty",
            GuardState::PendingConfirmation(_) => "pendingConfirmation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Save,
    Discard,
    Cancel,
}

impl Choice {
    pub fn parse(raw: &str) -> Option<Choice> {
        match raw {
            "save" => Some(Choice::Save),
            "discard" => Some(Choice::Discard),
            "cancel" => Some(Choice::Cancel),
            _ => None,
        }
    }
}

/// Holds back navigation while the draft is dirty until the user decides to
/// save, discard or stay.
#[derive(Debug)]
pub struct NavigationGuard {
    state: GuardState,
}

impl Default for NavigationGuard {
    fn default() -> Self {
        NavigationGuard {
            state: GuardState::Clean,
        }
    }
}

impl NavigationGuard {
    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn pending_action(&self) -> Option<&NavAction> {
        match &self.state {
            GuardState::PendingConfirmation(a) => Some(a),
            _ => None,
        }
    }

    /// Follows the draft's dirty flag. Ignored while a confirmation is open.
    pub fn sync(&mut self, has_unsaved: bool) {
        if matches!(self.state, GuardState::PendingConfirmation(_)) {
            return;
        }
        self.state = if has_unsaved {
            GuardState::Dirty
        } else {
            GuardState::Clean
        };
    }

    /// Returns the action to perform now, or `None` when it was stored for
    /// confirmation. A second attempt while confirming replaces the stored one.
    pub fn attempt(&mut self, action: NavAction, has_unsaved: bool) -> Option<NavAction> {
        if let GuardState::PendingConfirmation(_) = self.state {
            tracing::debug!(?action, "replacing pending navigation");
            self.state = GuardState::PendingConfirmation(action);
            return None;
        }
        self.sync(has_unsaved);
        match self.state {
            GuardState::Clean => Some(action),
            _ => {
                tracing::debug!(?action, "navigation held for confirmation");
                self.state = GuardState::PendingConfirmation(action);
                None
            }
        }
    }

    /// Runs `commit`; on success the guard is clean and the stored action is
    /// returned. On failure the confirmation stays open. `Ok(None)` when
    /// nothing was pending, in which case `commit` is not called.
    pub fn save<E, F>(&mut self, commit: F) -> Result<Option<NavAction>, E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        let Some(action) = self.pending_action().cloned() else {
            return Ok(None);
        };
        commit()?;
        self.state = GuardState::Clean;
        Ok(Some(action))
    }

    pub fn discard<F: FnOnce()>(&mut self, clear: F) -> Option<NavAction> {
        let action = self.pending_action().cloned()?;
        clear();
        self.state = GuardState::Clean;
        Some(action)
    }

    /// Closes the confirmation and drops the stored action.
    pub fn cancel(&mut self) -> bool {
        if self.pending_action().is_none() {
            return false;
        }
        self.state = GuardState::Dirty;
        true
    }
}

/// What the admin is currently looking at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub teacher_id: Option<i64>,
    #[serde(serialize_with = "serialize_iso_date")]
    pub week_start: NaiveDate,
    pub tab: String,
    pub logged_in: bool,
}

fn serialize_iso_date<S: serde::Serializer>(d: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&dates::format_iso_date(*d))
}

impl ViewState {
    pub fn new(week_start: NaiveDate) -> Self {
        ViewState {
            teacher_id: None,
            week_start,
            tab: DEFAULT_TAB.to_string(),
            logged_in: true,
        }
    }

    pub fn apply(&mut self, action: &NavAction, current_week: NaiveDate) {
        match action {
            // Off the end of the calendar the week stays where it is.
            NavAction::PreviousWeek => {
                if let Some(week) = dates::subtract_days(self.week_start, 7) {
                    self.week_start = week;
                }
            }
            NavAction::NextWeek => {
                if let Some(week) = dates::add_days(self.week_start, 7) {
                    self.week_start = week;
                }
            }
            NavAction::CurrentWeek => {
                self.week_start = current_week;
            }
            NavAction::SwitchTab { tab } => {
                self.tab = tab.clone();
            }
            NavAction::Logout => {
                *self = ViewState::new(current_week);
                self.logged_in = false;
            }
        }
    }
}
