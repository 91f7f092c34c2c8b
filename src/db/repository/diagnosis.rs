use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::DiagnosisEntry;

/// Appends a diagnosis after the patient's existing entries.
pub fn add_diagnosis(
    conn: &Connection,
    patient_id: &Uuid,
    code: &str,
    description: &str,
    is_primary: bool,
) -> Result<DiagnosisEntry, DatabaseError> {
    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM diagnoses WHERE patient_id = ?1",
        params![patient_id.to_string()],
        |row| row.get(0),
    )?;

    let entry = DiagnosisEntry {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        position,
        code: code.trim().to_string(),
        description: description.trim().to_string(),
        is_primary,
    };

    conn.execute(
        "INSERT INTO diagnoses (id, patient_id, position, code, description, is_primary)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id.to_string(),
            entry.patient_id.to_string(),
            entry.position,
            entry.code,
            entry.description,
            entry.is_primary,
        ],
    )?;
    Ok(entry)
}

/// Diagnoses in insertion order.
pub fn get_diagnoses(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<DiagnosisEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, position, code, description, is_primary FROM diagnoses
         WHERE patient_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, bool>(4)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, position, code, description, is_primary) = row?;
        entries.push(DiagnosisEntry {
            id: parse_uuid(&id)?,
            patient_id: *patient_id,
            position,
            code,
            description,
            is_primary,
        });
    }
    Ok(entries)
}
