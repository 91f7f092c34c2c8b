use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::patient::{patient_from_row, PatientRow};
use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::enums::ProgramType;
use crate::models::{Patient, PatientGroup};

pub fn insert_group(conn: &Connection, group: &PatientGroup) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patient_groups (id, name, program_type) VALUES (?1, ?2, ?3)",
        params![group.id.to_string(), group.name, group.program_type.as_str()],
    )?;
    Ok(())
}

pub fn get_group(conn: &Connection, group_id: &Uuid) -> Result<PatientGroup, DatabaseError> {
    let (id, name, program_type) = conn
        .query_row(
            "SELECT id, name, program_type FROM patient_groups WHERE id = ?1",
            params![group_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DatabaseError::not_found("PatientGroup", group_id),
            other => DatabaseError::from(other),
        })?;

    Ok(PatientGroup {
        id: parse_uuid(&id)?,
        name,
        program_type: ProgramType::from_str(&program_type)?,
    })
}

pub fn add_group_member(
    conn: &Connection,
    group_id: &Uuid,
    patient_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO group_members (group_id, patient_id) VALUES (?1, ?2)",
        params![group_id.to_string(), patient_id.to_string()],
    )?;
    Ok(())
}

/// Members of a group ordered by name.
pub fn get_group_members(
    conn: &Connection,
    group_id: &Uuid,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.full_name, p.program_type, p.admission_date, p.discharge_date
         FROM patients p
         JOIN group_members m ON m.patient_id = p.id
         WHERE m.group_id = ?1
         ORDER BY p.full_name, p.id",
    )?;
    let rows = stmt.query_map(params![group_id.to_string()], |row| {
        Ok::<PatientRow, rusqlite::Error>((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    })?;

    let mut members = Vec::new();
    for row in rows {
        members.push(patient_from_row(row?)?);
    }
    Ok(members)
}
