use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_date, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::{AttendanceStatus, WeekStatus};
use crate::models::{AttendanceRecord, AttendanceWeek, WeekId};

// ─── Attendance records ───────────────────────────────────────────────────────

/// Inserts or updates the record for (patient, date). Locked rows are never
/// touched; attempting to change one is a constraint violation.
pub fn upsert_attendance(
    conn: &Connection,
    record: &AttendanceRecord,
) -> Result<AttendanceRecord, DatabaseError> {
    let changed = conn.execute(
        "INSERT INTO attendance_records (id, patient_id, date, status, justification, is_locked)
         VALUES (?1, ?2, ?3, ?4, ?5, 0)
         ON CONFLICT(patient_id, date) DO UPDATE
            SET status = excluded.status, justification = excluded.justification
            WHERE attendance_records.is_locked = 0",
        params![
            record.id.to_string(),
            record.patient_id.to_string(),
            record.date.to_string(),
            record.status.as_str(),
            record.justification,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "Attendance for patient {} on {} is locked",
            record.patient_id, record.date
        )));
    }

    find_attendance(conn, &record.patient_id, record.date)?
        .ok_or_else(|| DatabaseError::not_found("AttendanceRecord", record.id))
}

pub fn find_attendance(
    conn: &Connection,
    patient_id: &Uuid,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, DatabaseError> {
    conn.query_row(
        "SELECT id, patient_id, date, status, justification, is_locked
         FROM attendance_records WHERE patient_id = ?1 AND date = ?2",
        params![patient_id.to_string(), date.to_string()],
        map_row,
    )
    .optional()?
    .map(record_from_row)
    .transpose()
}

/// Records of one patient within `[from, to]`, ordered by date.
pub fn get_attendance_range(
    conn: &Connection,
    patient_id: &Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<AttendanceRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, date, status, justification, is_locked
         FROM attendance_records
         WHERE patient_id = ?1 AND date >= ?2 AND date <= ?3
         ORDER BY date",
    )?;
    let rows = stmt.query_map(
        params![patient_id.to_string(), from.to_string(), to.to_string()],
        map_row,
    )?;
    collect(rows)
}

/// Records of every member of a group within `[from, to]`.
pub fn get_group_attendance(
    conn: &Connection,
    group_id: &Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<AttendanceRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.patient_id, a.date, a.status, a.justification, a.is_locked
         FROM attendance_records a
         JOIN group_members m ON m.patient_id = a.patient_id
         WHERE m.group_id = ?1 AND a.date >= ?2 AND a.date <= ?3
         ORDER BY a.date, a.patient_id",
    )?;
    let rows = stmt.query_map(
        params![group_id.to_string(), from.to_string(), to.to_string()],
        map_row,
    )?;
    collect(rows)
}

/// Flags every group member's record within `[from, to]` as locked.
pub fn lock_group_attendance(
    conn: &Connection,
    group_id: &Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE attendance_records SET is_locked = 1
         WHERE date >= ?2 AND date <= ?3
           AND patient_id IN (SELECT patient_id FROM group_members WHERE group_id = ?1)",
        params![group_id.to_string(), from.to_string(), to.to_string()],
    )?;
    Ok(changed)
}

// ─── Attendance weeks ─────────────────────────────────────────────────────────

/// Week state; weeks without a row are drafts.
pub fn get_week(conn: &Connection, week: &WeekId) -> Result<AttendanceWeek, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT status, locked_at FROM attendance_weeks
             WHERE group_id = ?1 AND week_start = ?2",
            params![week.group_id.to_string(), week.week_start.to_string()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?;

    match row {
        Some((status, locked_at)) => Ok(AttendanceWeek {
            week: *week,
            status: WeekStatus::from_str(&status)?,
            locked_at,
        }),
        None => Ok(AttendanceWeek {
            week: *week,
            status: WeekStatus::Draft,
            locked_at: None,
        }),
    }
}

/// Whether any locked week of `group_id` covers `date`.
pub fn is_date_locked(
    conn: &Connection,
    group_id: &Uuid,
    date: NaiveDate,
) -> Result<bool, DatabaseError> {
    let locked: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM attendance_weeks
         WHERE group_id = ?1 AND status = 'locked'
           AND week_start <= ?2 AND date(week_start, '+6 days') >= ?2",
        params![group_id.to_string(), date.to_string()],
        |row| row.get(0),
    )?;
    Ok(locked)
}

pub fn set_week_locked(
    conn: &Connection,
    week: &WeekId,
    locked_at: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO attendance_weeks (group_id, week_start, status, locked_at)
         VALUES (?1, ?2, 'locked', ?3)
         ON CONFLICT(group_id, week_start) DO UPDATE
            SET status = 'locked', locked_at = excluded.locked_at",
        params![week.group_id.to_string(), week.week_start.to_string(), locked_at],
    )?;
    Ok(())
}

type AttendanceRow = (String, String, String, String, Option<String>, bool);

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn record_from_row(row: AttendanceRow) -> Result<AttendanceRecord, DatabaseError> {
    let (id, patient_id, date, status, justification, is_locked) = row;
    Ok(AttendanceRecord {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        date: parse_date(&date)?,
        status: AttendanceStatus::from_str(&status)?,
        justification,
        is_locked,
    })
}

fn collect(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRow>>,
) -> Result<Vec<AttendanceRecord>, DatabaseError> {
    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_row(row?)?);
    }
    Ok(records)
}
