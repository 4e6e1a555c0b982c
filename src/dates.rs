use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Timelike};

pub const ISO_DATE: &str = "%Y-%m-%d";

pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), ISO_DATE).ok()
}

pub fn format_iso_date(date: NaiveDate) -> String {
    date.format(ISO_DATE).to_string()
}

/// Monday of the week containing `date`. Dates in the first partial week of
/// the calendar range map to themselves.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    subtract_days(date, day_of_week(date)).unwrap_or(date)
}

pub fn is_week_start(date: NaiveDate) -> bool {
    day_of_week(date) == 0
}

pub fn current_week_start() -> NaiveDate {
    week_start_of(Local::now().date_naive())
}

/// `None` when the result leaves chrono's calendar range.
pub fn add_days(date: NaiveDate, n: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::days(n))
}

pub fn subtract_days(date: NaiveDate, n: i64) -> Option<NaiveDate> {
    date.checked_sub_signed(Duration::days(n))
}

/// Whether the week, and the weeks either side of it, fit in the calendar range.
pub fn is_navigable_week(week_start: NaiveDate) -> bool {
    subtract_days(week_start, 7).is_some() && add_days(week_start, 13).is_some()
}

pub fn week_dates(week_start: NaiveDate) -> Vec<NaiveDate> {
    (0..7).filter_map(|d| add_days(week_start, d)).collect()
}

/// Day index used by the schedule grid: Monday=0 .. Sunday=6.
pub fn day_of_week(date: NaiveDate) -> i64 {
    date.weekday().num_days_from_monday() as i64
}

pub fn is_valid_day_of_week(day: i64) -> bool {
    (0..=6).contains(&day)
}

fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let (h, m) = raw.trim().split_once(':')?;
    let h = h.parse::<u32>().ok()?;
    if m.len() != 2 {
        return None;
    }
    let m = m.parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(h, m, 0)
}

fn format_clock(t: NaiveTime) -> String {
    format!("{}:{:02}", t.hour(), t.minute())
}

/// Parses a grid slot such as `9:00-9:30`. The end must be after the start.
pub fn parse_time_slot(raw: &str) -> Option<(NaiveTime, NaiveTime)> {
    let (start, end) = raw.split_once('-')?;
    let start = parse_clock(start)?;
    let end = parse_clock(end)?;
    if end <= start {
        return None;
    }
    Some((start, end))
}

pub fn format_time_slot(start: NaiveTime, end: NaiveTime) -> String {
    format!("{}-{}", format_clock(start), format_clock(end))
}

pub fn parse_day_clock(raw: &str) -> Option<NaiveTime> {
    parse_clock(raw)
}

/// All slots of `slot_minutes` between `day_start` and `day_end`.
/// A trailing partial slot is dropped.
pub fn day_time_slots(day_start: NaiveTime, day_end: NaiveTime, slot_minutes: i64) -> Vec<String> {
    let mut out = Vec::new();
    if slot_minutes <= 0 {
        return out;
    }
    let step = Duration::minutes(slot_minutes);
    let mut cur = day_start;
    loop {
        let (next, wrapped) = cur.overflowing_add_signed(step);
        if wrapped != 0 || next > day_end || next <= cur {
            break;
        }
        out.push(format_time_slot(cur, next));
        cur = next;
    }
    out
}

/// Sort key for a slot string; unparseable slots sort last.
pub fn time_slot_sort_key(raw: &str) -> (u32, String) {
    match parse_time_slot(raw) {
        Some((start, _)) => (start.num_seconds_from_midnight(), raw.to_string()),
        None => (u32::MAX, raw.to_string()),
    }
}
