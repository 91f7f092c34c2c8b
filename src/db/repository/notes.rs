use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_date, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::NoteStatus;
use crate::models::{ActivityResponse, NoteParagraph, ResponseKey, SessionNote};

// ─── Activity responses ───────────────────────────────────────────────────────

pub fn upsert_response(conn: &Connection, response: &ActivityResponse) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO activity_responses (patient_id, date, activity_index, note_index, activity_code, response)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(patient_id, date, activity_index) DO UPDATE
            SET note_index = excluded.note_index,
                activity_code = excluded.activity_code,
                response = excluded.response",
        params![
            response.key.patient_id.to_string(),
            response.key.date.to_string(),
            response.key.activity_index,
            response.note_index,
            response.activity_code,
            response.response,
        ],
    )?;
    Ok(())
}

/// Responses of every group member within `[from, to]`.
pub fn get_group_responses(
    conn: &Connection,
    group_id: &Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<ActivityResponse>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT r.patient_id, r.date, r.activity_index, r.note_index, r.activity_code, r.response
         FROM activity_responses r
         JOIN group_members m ON m.patient_id = r.patient_id
         WHERE m.group_id = ?1 AND r.date >= ?2 AND r.date <= ?3
         ORDER BY r.date, r.patient_id, r.activity_index",
    )?;
    let rows = stmt.query_map(
        params![group_id.to_string(), from.to_string(), to.to_string()],
        map_response_row,
    )?;
    collect_responses(rows)
}

/// Responses of one patient on one day, ordered by activity index.
pub fn get_day_responses(
    conn: &Connection,
    patient_id: &Uuid,
    date: NaiveDate,
) -> Result<Vec<ActivityResponse>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT patient_id, date, activity_index, note_index, activity_code, response
         FROM activity_responses
         WHERE patient_id = ?1 AND date = ?2
         ORDER BY activity_index",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string(), date.to_string()], map_response_row)?;
    collect_responses(rows)
}

/// Drops every stored response of one patient on one day.
pub fn delete_day_responses(conn: &Connection, patient_id: &Uuid, date: NaiveDate) -> Result<usize, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM activity_responses WHERE patient_id = ?1 AND date = ?2",
        params![patient_id.to_string(), date.to_string()],
    )?;
    Ok(removed)
}

type ResponseRow = (String, String, u32, u8, String, String);

fn map_response_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResponseRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn collect_responses(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<ResponseRow>>,
) -> Result<Vec<ActivityResponse>, DatabaseError> {
    let mut out = Vec::new();
    for row in rows {
        let (patient_id, date, activity_index, note_index, activity_code, response) = row?;
        out.push(ActivityResponse {
            key: ResponseKey {
                patient_id: parse_uuid(&patient_id)?,
                date: parse_date(&date)?,
                activity_index,
            },
            note_index,
            activity_code,
            response,
        });
    }
    Ok(out)
}

// ─── Session notes ────────────────────────────────────────────────────────────

pub fn upsert_session_note(conn: &Connection, note: &SessionNote) -> Result<(), DatabaseError> {
    let content = serde_json::to_string(&note.paragraphs)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("JSON serialization: {e}")))?;

    conn.execute(
        "INSERT INTO session_notes (id, patient_id, date, note_index, status, rotation_offset, content, file_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(patient_id, date, note_index) DO UPDATE
            SET status = excluded.status,
                rotation_offset = excluded.rotation_offset,
                content = excluded.content,
                file_path = excluded.file_path",
        params![
            note.id.to_string(),
            note.patient_id.to_string(),
            note.date.to_string(),
            note.note_index,
            note.status.as_str(),
            note.rotation_offset,
            content,
            note.file_path,
        ],
    )?;
    Ok(())
}

/// Notes of one patient on one day, ordered by note index.
pub fn get_session_notes(
    conn: &Connection,
    patient_id: &Uuid,
    date: NaiveDate,
) -> Result<Vec<SessionNote>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, note_index, status, rotation_offset, content, file_path
         FROM session_notes WHERE patient_id = ?1 AND date = ?2
         ORDER BY note_index",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string(), date.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, u8>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, u32>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    let mut notes = Vec::new();
    for row in rows {
        let (id, note_index, status, rotation_offset, content, file_path) = row?;
        let paragraphs: Vec<NoteParagraph> = serde_json::from_str(&content)
            .map_err(|e| DatabaseError::ConstraintViolation(format!("note content JSON: {e}")))?;
        notes.push(SessionNote {
            id: parse_uuid(&id)?,
            patient_id: *patient_id,
            date,
            note_index,
            status: NoteStatus::from_str(&status)?,
            rotation_offset,
            paragraphs,
            file_path,
        });
    }
    Ok(notes)
}

// ─── Rotation cursors ─────────────────────────────────────────────────────────

/// Stored cursors of the given patients, keyed by (activity code, patient).
pub fn load_rotation_cursors(
    conn: &Connection,
    patient_ids: &[Uuid],
) -> Result<HashMap<(String, Uuid), u32>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT activity_code, cursor FROM rotation_cursors WHERE patient_id = ?1",
    )?;
    let mut cursors = HashMap::new();
    for patient_id in patient_ids {
        let rows = stmt.query_map(params![patient_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;
        for row in rows {
            let (code, cursor) = row?;
            cursors.insert((code, *patient_id), cursor);
        }
    }
    Ok(cursors)
}

pub fn save_rotation_cursors(
    conn: &Connection,
    cursors: &HashMap<(String, Uuid), u32>,
) -> Result<(), DatabaseError> {
    for ((code, patient_id), cursor) in cursors {
        conn.execute(
            "INSERT INTO rotation_cursors (activity_code, patient_id, cursor) VALUES (?1, ?2, ?3)
             ON CONFLICT(activity_code, patient_id) DO UPDATE SET cursor = excluded.cursor",
            params![code, patient_id.to_string(), cursor],
        )?;
    }
    Ok(())
}
