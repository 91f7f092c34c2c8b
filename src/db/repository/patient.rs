use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_date, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::ProgramType;
use crate::models::Patient;

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, full_name, program_type, admission_date, discharge_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            patient.id.to_string(),
            patient.full_name,
            patient.program_type.as_str(),
            patient.admission_date.to_string(),
            patient.discharge_date.map(|d| d.to_string()),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Patient, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, full_name, program_type, admission_date, discharge_date
             FROM patients WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DatabaseError::not_found("Patient", id),
            other => DatabaseError::from(other),
        })?;

    patient_from_row(row)
}

/// Records the discharge date. Attendance slots after it are no longer required.
pub fn set_discharge_date(
    conn: &Connection,
    id: &Uuid,
    discharge_date: NaiveDate,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET discharge_date = ?1 WHERE id = ?2",
        params![discharge_date.to_string(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Patient", id));
    }
    Ok(())
}

pub(crate) type PatientRow = (String, String, String, String, Option<String>);

pub(crate) fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    let (id, full_name, program_type, admission, discharge) = row;
    Ok(Patient {
        id: parse_uuid(&id)?,
        full_name,
        program_type: ProgramType::from_str(&program_type)?,
        admission_date: parse_date(&admission)?,
        discharge_date: discharge.as_deref().map(parse_date).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn insert_and_get_patient() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, "Dana Levi", date(2025, 1, 1));

        let loaded = get_patient(&conn, &patient.id).unwrap();
        assert_eq!(loaded.full_name, "Dana Levi");
        assert_eq!(loaded.admission_date, date(2025, 1, 1));
        assert!(loaded.discharge_date.is_none());
    }

    #[test]
    fn get_missing_patient_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = get_patient(&conn, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn discharge_date_is_persisted() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, "Noa Katz", date(2025, 3, 2));
        set_discharge_date(&conn, &patient.id, date(2025, 5, 1)).unwrap();

        let loaded = get_patient(&conn, &patient.id).unwrap();
        assert_eq!(loaded.discharge_date, Some(date(2025, 5, 1)));
        assert!(loaded.is_enrolled_on(date(2025, 5, 1)));
        assert!(!loaded.is_enrolled_on(date(2025, 5, 2)));
    }
}
