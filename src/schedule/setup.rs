use crate::{dates, db};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

pub const SETUP_KEY: &str = "setup.schedule";

const DEFAULT_SLOT_MINUTES: i64 = 30;
const DEFAULT_DAY_START: &str = "9:00";
const DEFAULT_DAY_END: &str = "21:00";

/// Shape of the weekly grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSetup {
    pub slot_minutes: i64,
    pub day_start: String,
    pub day_end: String,
}

impl Default for ScheduleSetup {
    fn default() -> Self {
        ScheduleSetup {
            slot_minutes: DEFAULT_SLOT_MINUTES,
            day_start: DEFAULT_DAY_START.to_string(),
            day_end: DEFAULT_DAY_END.to_string(),
        }
    }
}

impl ScheduleSetup {
    pub fn to_json(&self) -> Value {
        json!({
            "slotMinutes": self.slot_minutes,
            "dayStart": self.day_start,
            "dayEnd": self.day_end,
        })
    }

    pub fn time_slots(&self) -> Vec<String> {
        match (
            dates::parse_day_clock(&self.day_start),
            dates::parse_day_clock(&self.day_end),
        ) {
            (Some(start), Some(end)) => dates::day_time_slots(start, end, self.slot_minutes),
            _ => Vec::new(),
        }
    }
}

fn parse_clock_field(v: &Value, key: &str) -> Result<String, String> {
    let s = v
        .as_str()
        .ok_or_else(|| format!("{} must be a string", key))?
        .trim()
        .to_string();
    if dates::parse_day_clock(&s).is_none() {
        return Err(format!("{} must be H:MM", key));
    }
    Ok(s)
}

/// Applies `patch` onto `current`. Unknown fields and bad values are errors;
/// nothing is applied unless the whole patch is valid.
pub fn merge_patch(current: &mut ScheduleSetup, patch: &Map<String, Value>) -> Result<(), String> {
    let mut next = current.clone();
    for (k, v) in patch {
        match k.as_str() {
            "slotMinutes" => {
                let n = v
                    .as_i64()
                    .ok_or_else(|| "slotMinutes must be an integer".to_string())?;
                if !(5..=240).contains(&n) {
                    return Err("slotMinutes must be between 5 and 240".to_string());
                }
                next.slot_minutes = n;
            }
            "dayStart" => next.day_start = parse_clock_field(v, k)?,
            "dayEnd" => next.day_end = parse_clock_field(v, k)?,
            _ => return Err(format!("unknown schedule field: {}", k)),
        }
    }
    let start = dates::parse_day_clock(&next.day_start);
    let end = dates::parse_day_clock(&next.day_end);
    if let (Some(start), Some(end)) = (start, end) {
        if end <= start {
            return Err("dayEnd must be after dayStart".to_string());
        }
    }
    *current = next;
    Ok(())
}

pub fn load(conn: &Connection) -> anyhow::Result<ScheduleSetup> {
    let mut current = ScheduleSetup::default();
    if let Some(saved) = db::settings_get_json(conn, SETUP_KEY)? {
        if let Some(obj) = saved.as_object() {
            // Best-effort: a malformed saved section falls back to defaults.
            if let Err(e) = merge_patch(&mut current, obj) {
                tracing::warn!(error = %e, "ignoring saved schedule setup");
            }
        }
    }
    Ok(current)
}

pub fn save(conn: &Connection, setup: &ScheduleSetup) -> anyhow::Result<()> {
    db::settings_set_json(conn, SETUP_KEY, &setup.to_json())
}
