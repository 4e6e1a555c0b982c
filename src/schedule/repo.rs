use super::api::{ApiError, ScheduleApi};
use super::{NewSchedule, ScheduleRecord, STATUS_SCHEDULED};
use crate::dates;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

pub const MSG_TEACHER_NOT_FOUND: &str = "Teacher not found";
pub const MSG_STUDENT_NOT_FOUND: &str = "Student not found";
pub const MSG_OTHER_TEACHER: &str = "Student is already assigned to another teacher at this time";
pub const MSG_SLOT_CONFLICT: &str = "Conflict: time slot is already booked";
pub const MSG_SCHEDULE_NOT_FOUND: &str = "Schedule not found";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

/// Authoritative schedule storage backed by the workspace database.
pub struct ScheduleRepo<'a> {
    conn: &'a Connection,
}

fn transport(e: rusqlite::Error) -> ApiError {
    ApiError::Transport(e.to_string())
}

fn now_ts() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

fn map_record(r: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleRecord> {
    Ok(ScheduleRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        student_name: r.get(2)?,
        teacher_id: r.get(3)?,
        day_of_week: r.get(4)?,
        time_slot: r.get(5)?,
        week_start_date: r.get(6)?,
        attendance_status: r.get(7)?,
    })
}

const RECORD_COLUMNS: &str = "s.id, s.student_id, COALESCE(st.name, ''), s.teacher_id, s.day_of_week,
     s.time_slot, s.week_start_date, s.attendance_status";

impl<'a> ScheduleRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        ScheduleRepo { conn }
    }

    pub fn create_teacher(&self, name: &str) -> anyhow::Result<Person> {
        self.conn
            .execute("INSERT INTO teachers(name, active) VALUES(?, 1)", [name])?;
        Ok(Person {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            active: true,
        })
    }

    pub fn create_student(&self, name: &str) -> anyhow::Result<Person> {
        self.conn
            .execute("INSERT INTO students(name, active) VALUES(?, 1)", [name])?;
        Ok(Person {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            active: true,
        })
    }

    pub fn list_teachers(&self) -> anyhow::Result<Vec<Person>> {
        self.list_people("teachers")
    }

    pub fn list_students(&self) -> anyhow::Result<Vec<Person>> {
        self.list_people("students")
    }

    fn list_people(&self, table: &str) -> anyhow::Result<Vec<Person>> {
        let sql = format!("SELECT id, name, active FROM {} ORDER BY name, id", table);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Person {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    active: r.get::<_, i64>(2)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn teacher_exists(&self, teacher_id: i64) -> anyhow::Result<bool> {
        Ok(self
            .conn
            .query_row("SELECT 1 FROM teachers WHERE id = ?", [teacher_id], |r| {
                r.get::<_, i64>(0)
            })
            .optional()?
            .is_some())
    }

    pub fn student_name(&self, student_id: i64) -> anyhow::Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT name FROM students WHERE id = ?", [student_id], |r| {
                r.get::<_, String>(0)
            })
            .optional()?)
    }

    /// Returns `false` when no such record exists.
    pub fn set_attendance(&self, schedule_id: i64, status: &str) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE schedules SET attendance_status = ? WHERE id = ?",
            params![status, schedule_id],
        )?;
        Ok(changed > 0)
    }

    fn validate_new(&self, input: &NewSchedule) -> Result<(), ApiError> {
        if input.student_id <= 0 {
            return Err(ApiError::Validation(
                "Missing required field: student_id".to_string(),
            ));
        }
        if input.teacher_id <= 0 {
            return Err(ApiError::Validation(
                "Missing required field: teacher_id".to_string(),
            ));
        }
        if !dates::is_valid_day_of_week(input.day_of_week) {
            return Err(ApiError::Validation("Invalid day_of_week".to_string()));
        }
        if input.time_slot.trim().is_empty() {
            return Err(ApiError::Validation(
                "Missing required field: time_slot".to_string(),
            ));
        }
        if dates::parse_time_slot(&input.time_slot).is_none() {
            return Err(ApiError::Validation("Invalid time_slot".to_string()));
        }
        if input.week_start_date.trim().is_empty() {
            return Err(ApiError::Validation(
                "Missing required field: week_start_date".to_string(),
            ));
        }
        match dates::parse_iso_date(&input.week_start_date) {
            Some(d) if dates::is_week_start(d) => Ok(()),
            Some(_) => Err(ApiError::Validation(
                "week_start_date must be a Monday".to_string(),
            )),
            None => Err(ApiError::Validation("Invalid week_start_date".to_string())),
        }
    }
}

impl ScheduleApi for ScheduleRepo<'_> {
    fn get_teacher_schedule(
        &self,
        teacher_id: i64,
        week_start: NaiveDate,
    ) -> Result<Vec<ScheduleRecord>, ApiError> {
        let sql = format!(
            "SELECT {} FROM schedules s LEFT JOIN students st ON st.id = s.student_id
             WHERE s.teacher_id = ? AND s.week_start_date = ?
             ORDER BY s.day_of_week, s.id",
            RECORD_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql).map_err(transport)?;
        let mut rows = stmt
            .query_map(
                params![teacher_id, dates::format_iso_date(week_start)],
                map_record,
            )
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(transport)?;
        rows.sort_by(|a, b| {
            a.day_of_week
                .cmp(&b.day_of_week)
                .then_with(|| {
                    dates::time_slot_sort_key(&a.time_slot)
                        .cmp(&dates::time_slot_sort_key(&b.time_slot))
                })
        });
        Ok(rows)
    }

    fn create_schedule(&self, input: &NewSchedule) -> Result<ScheduleRecord, ApiError> {
        self.validate_new(input)?;

        let teacher_exists = self
            .conn
            .query_row(
                "SELECT 1 FROM teachers WHERE id = ?",
                [input.teacher_id],
                |r| r.get::<_, i64>(0),
            )
            .optional()
            .map_err(transport)?
            .is_some();
        if !teacher_exists {
            return Err(ApiError::Rejected(MSG_TEACHER_NOT_FOUND.to_string()));
        }

        let student_name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM students WHERE id = ?",
                [input.student_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(transport)?;
        let Some(student_name) = student_name else {
            return Err(ApiError::Rejected(MSG_STUDENT_NOT_FOUND.to_string()));
        };

        let other_teacher: Option<i64> = self
            .conn
            .query_row(
                "SELECT teacher_id FROM schedules
                 WHERE student_id = ? AND week_start_date = ? AND day_of_week = ? AND time_slot = ?
                   AND teacher_id <> ?",
                params![
                    input.student_id,
                    input.week_start_date,
                    input.day_of_week,
                    input.time_slot,
                    input.teacher_id
                ],
                |r| r.get(0),
            )
            .optional()
            .map_err(transport)?;
        if other_teacher.is_some() {
            return Err(ApiError::Rejected(MSG_OTHER_TEACHER.to_string()));
        }

        let occupied: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM schedules
                 WHERE teacher_id = ? AND week_start_date = ? AND day_of_week = ? AND time_slot = ?",
                params![
                    input.teacher_id,
                    input.week_start_date,
                    input.day_of_week,
                    input.time_slot
                ],
                |r| r.get(0),
            )
            .optional()
            .map_err(transport)?;
        if occupied.is_some() {
            return Err(ApiError::Rejected(MSG_SLOT_CONFLICT.to_string()));
        }

        self.conn
            .execute(
                "INSERT INTO schedules(student_id, teacher_id, day_of_week, time_slot, week_start_date, attendance_status, created_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
                params![
                    input.student_id,
                    input.teacher_id,
                    input.day_of_week,
                    input.time_slot,
                    input.week_start_date,
                    STATUS_SCHEDULED,
                    now_ts()
                ],
            )
            .map_err(transport)?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(schedule_id = id, teacher_id = input.teacher_id, "schedule created");

        Ok(ScheduleRecord {
            id,
            student_id: input.student_id,
            student_name,
            teacher_id: input.teacher_id,
            day_of_week: input.day_of_week,
            time_slot: input.time_slot.clone(),
            week_start_date: input.week_start_date.clone(),
            attendance_status: STATUS_SCHEDULED.to_string(),
        })
    }

    fn delete_schedule(&self, schedule_id: i64) -> Result<(), ApiError> {
        let changed = self
            .conn
            .execute("DELETE FROM schedules WHERE id = ?", [schedule_id])
            .map_err(transport)?;
        if changed == 0 {
            return Err(ApiError::Rejected(MSG_SCHEDULE_NOT_FOUND.to_string()));
        }
        tracing::debug!(schedule_id, "schedule deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch(
            "CREATE TABLE teachers(id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, active INTEGER NOT NULL DEFAULT 1);
             CREATE TABLE students(id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, active INTEGER NOT NULL DEFAULT 1);
             CREATE TABLE schedules(
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                student_id INTEGER NOT NULL,
                teacher_id INTEGER NOT NULL,
                day_of_week INTEGER NOT NULL,
                time_slot TEXT NOT NULL,
                week_start_date TEXT NOT NULL,
                created_at TEXT,
                attendance_status TEXT NOT NULL DEFAULT 'scheduled'
             );",
        )
        .expect("schema");
        conn
    }

    fn lesson(student_id: i64, teacher_id: i64, day: i64, slot: &str) -> NewSchedule {
        NewSchedule {
            student_id,
            teacher_id,
            day_of_week: day,
            time_slot: slot.to_string(),
            week_start_date: "2024-06-03".to_string(),
        }
    }

    #[test]
    fn create_rejects_conflicts_with_distinct_messages() {
        let conn = memory_db();
        let repo = ScheduleRepo::new(&conn);
        let t1 = repo.create_teacher("Anna Schmidt").expect("t1").id;
        let t2 = repo.create_teacher("Luis Ortega").expect("t2").id;
        let emma = repo.create_student("Emma Wilson").expect("emma").id;
        let james = repo.create_student("James Brown").expect("james").id;

        let created = repo
            .create_schedule(&lesson(emma, t1, 0, "9:00-9:30"))
            .expect("create");
        assert_eq!(created.student_name, "Emma Wilson");
        assert_eq!(created.attendance_status, STATUS_SCHEDULED);

        let err = repo
            .create_schedule(&lesson(james, t1, 0, "9:00-9:30"))
            .unwrap_err();
        assert_eq!(err, ApiError::Rejected(MSG_SLOT_CONFLICT.to_string()));

        let err = repo
            .create_schedule(&lesson(emma, t2, 0, "9:00-9:30"))
            .unwrap_err();
        assert_eq!(err, ApiError::Rejected(MSG_OTHER_TEACHER.to_string()));

        let err = repo
            .create_schedule(&lesson(999, t1, 1, "9:00-9:30"))
            .unwrap_err();
        assert_eq!(err, ApiError::Rejected(MSG_STUDENT_NOT_FOUND.to_string()));
    }

    #[test]
    fn create_validates_fields() {
        let conn = memory_db();
        let repo = ScheduleRepo::new(&conn);
        let t = repo.create_teacher("Anna Schmidt").expect("t").id;
        let s = repo.create_student("Emma Wilson").expect("s").id;

        assert!(matches!(
            repo.create_schedule(&lesson(0, t, 0, "9:00-9:30")),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            repo.create_schedule(&lesson(s, t, 7, "9:00-9:30")),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            repo.create_schedule(&lesson(s, t, 0, "")),
            Err(ApiError::Validation(_))
        ));
        let mut tuesday = lesson(s, t, 0, "9:00-9:30");
        tuesday.week_start_date = "2024-06-04".to_string();
        assert_eq!(
            repo.create_schedule(&tuesday).unwrap_err(),
            ApiError::Validation("week_start_date must be a Monday".to_string())
        );
    }

    #[test]
    fn week_schedule_is_sorted_and_delete_reports_missing() {
        let conn = memory_db();
        let repo = ScheduleRepo::new(&conn);
        let t = repo.create_teacher("Anna Schmidt").expect("t").id;
        let a = repo.create_student("Emma Wilson").expect("a").id;
        let b = repo.create_student("James Brown").expect("b").id;
        repo.create_schedule(&lesson(a, t, 2, "14:00-14:30")).expect("1");
        repo.create_schedule(&lesson(b, t, 0, "10:00-10:30")).expect("2");
        let first = repo.create_schedule(&lesson(a, t, 0, "9:00-9:30")).expect("3");

        let week = dates::parse_iso_date("2024-06-03").expect("week");
        let rows = repo.get_teacher_schedule(t, week).expect("rows");
        let slots: Vec<(i64, &str)> = rows
            .iter()
            .map(|r| (r.day_of_week, r.time_slot.as_str()))
            .collect();
        assert_eq!(
            slots,
            vec![(0, "9:00-9:30"), (0, "10:00-10:30"), (2, "14:00-14:30")]
        );

        repo.delete_schedule(first.id).expect("delete");
        assert_eq!(
            repo.delete_schedule(first.id).unwrap_err(),
            ApiError::Rejected(MSG_SCHEDULE_NOT_FOUND.to_string())
        );
    }
}
