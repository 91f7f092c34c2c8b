use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::PatientGoal;

/// Highest goal number a patient may carry.
pub const MAX_GOAL_NUMBER: u8 = 4;

/// Inserts or replaces the text of goal `goal_number` (1..=4) for a patient.
pub fn upsert_goal(
    conn: &Connection,
    patient_id: &Uuid,
    goal_number: u8,
    text: &str,
) -> Result<PatientGoal, DatabaseError> {
    if !(1..=MAX_GOAL_NUMBER).contains(&goal_number) {
        return Err(DatabaseError::ConstraintViolation(format!(
            "Goal number must be between 1 and {MAX_GOAL_NUMBER}, got {goal_number}"
        )));
    }
    if text.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation("Goal text is required".into()));
    }

    conn.execute(
        "INSERT INTO patient_goals (id, patient_id, goal_number, text)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(patient_id, goal_number) DO UPDATE SET text = excluded.text",
        params![Uuid::new_v4().to_string(), patient_id.to_string(), goal_number, text.trim()],
    )?;

    let id: String = conn.query_row(
        "SELECT id FROM patient_goals WHERE patient_id = ?1 AND goal_number = ?2",
        params![patient_id.to_string(), goal_number],
        |row| row.get(0),
    )?;

    Ok(PatientGoal {
        id: parse_uuid(&id)?,
        patient_id: *patient_id,
        goal_number,
        text: text.trim().to_string(),
    })
}

/// Goals ordered by goal number.
pub fn get_goals(conn: &Connection, patient_id: &Uuid) -> Result<Vec<PatientGoal>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, goal_number, text FROM patient_goals
         WHERE patient_id = ?1 ORDER BY goal_number",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, u8>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut goals = Vec::new();
    for row in rows {
        let (id, goal_number, text) = row?;
        goals.push(PatientGoal {
            id: parse_uuid(&id)?,
            patient_id: *patient_id,
            goal_number,
            text,
        });
    }
    Ok(goals)
}

pub fn count_goals(conn: &Connection, patient_id: &Uuid) -> Result<usize, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM patient_goals WHERE patient_id = ?1",
        params![patient_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub fn get_goal(conn: &Connection, goal_id: &Uuid) -> Result<PatientGoal, DatabaseError> {
    let (patient_id, goal_number, text) = conn
        .query_row(
            "SELECT patient_id, goal_number, text FROM patient_goals WHERE id = ?1",
            params![goal_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u8>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DatabaseError::not_found("Goal", goal_id),
            other => DatabaseError::from(other),
        })?;

    Ok(PatientGoal {
        id: *goal_id,
        patient_id: parse_uuid(&patient_id)?,
        goal_number,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn upsert_replaces_text_for_same_number() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, "Avi Cohen", date(2025, 1, 1));

        let first = upsert_goal(&conn, &patient.id, 2, "Attend group daily").unwrap();
        let second = upsert_goal(&conn, &patient.id, 2, "Attend group four days a week").unwrap();

        assert_eq!(first.id, second.id);
        let goals = get_goals(&conn, &patient.id).unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].text, "Attend group four days a week");
    }

    #[test]
    fn goal_number_out_of_range_rejected() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, "Avi Cohen", date(2025, 1, 1));
        assert!(upsert_goal(&conn, &patient.id, 0, "x").is_err());
        assert!(upsert_goal(&conn, &patient.id, 5, "x").is_err());
    }

    #[test]
    fn goals_come_back_ordered() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, "Avi Cohen", date(2025, 1, 1));
        upsert_goal(&conn, &patient.id, 3, "Third").unwrap();
        upsert_goal(&conn, &patient.id, 1, "First").unwrap();

        let numbers: Vec<u8> = get_goals(&conn, &patient.id)
            .unwrap()
            .iter()
            .map(|g| g.goal_number)
            .collect();
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(count_goals(&conn, &patient.id).unwrap(), 2);
    }

    #[test]
    fn get_unknown_goal_is_not_found() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            get_goal(&conn, &Uuid::new_v4()),
            Err(DatabaseError::NotFound { .. })
        ));
    }
}
