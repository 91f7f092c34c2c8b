use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_date, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::ProgressLevel;
use crate::models::GoalAssessment;

pub fn insert_assessment(
    conn: &Connection,
    assessment: &GoalAssessment,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO goal_assessments (id, goal_id, assessed_on, percentage, level, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            assessment.id.to_string(),
            assessment.goal_id.to_string(),
            assessment.assessed_on.to_string(),
            assessment.percentage,
            assessment.level.as_str(),
            assessment.notes,
        ],
    )?;
    Ok(())
}

/// Assessment history of one goal, oldest first.
pub fn get_assessments_for_goal(
    conn: &Connection,
    goal_id: &Uuid,
) -> Result<Vec<GoalAssessment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, goal_id, assessed_on, percentage, level, notes
         FROM goal_assessments WHERE goal_id = ?1
         ORDER BY assessed_on, rowid",
    )?;
    let rows = stmt.query_map(params![goal_id.to_string()], map_row)?;
    collect(rows)
}

/// Assessment history of every goal of a patient, oldest first.
pub fn get_assessments_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<GoalAssessment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.goal_id, a.assessed_on, a.percentage, a.level, a.notes
         FROM goal_assessments a
         JOIN patient_goals g ON a.goal_id = g.id
         WHERE g.patient_id = ?1
         ORDER BY g.goal_number, a.assessed_on, a.rowid",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], map_row)?;
    collect(rows)
}

type AssessmentRow = (String, String, String, u8, String, Option<String>);

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssessmentRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn collect(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<AssessmentRow>>,
) -> Result<Vec<GoalAssessment>, DatabaseError> {
    let mut out = Vec::new();
    for row in rows {
        let (id, goal_id, assessed_on, percentage, level, notes) = row?;
        out.push(GoalAssessment {
            id: parse_uuid(&id)?,
            goal_id: parse_uuid(&goal_id)?,
            assessed_on: parse_date(&assessed_on)?,
            percentage,
            level: ProgressLevel::from_str(&level)?,
            notes,
        });
    }
    Ok(out)
}
