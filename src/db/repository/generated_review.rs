use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_date, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{GeneratedReview, ProgressEntry};

pub fn insert_generated_review(
    conn: &Connection,
    review: &GeneratedReview,
) -> Result<(), DatabaseError> {
    let goal_json = serde_json::to_string(&review.goal_progress)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("JSON serialization: {e}")))?;
    let diagnosis_json = serde_json::to_string(&review.diagnosis_progress)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("JSON serialization: {e}")))?;

    conn.execute(
        "INSERT INTO generated_reviews (id, schedule_id, review_number, period_start, period_end,
                                        attendance_percentage, goal_progress, diagnosis_progress, file_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            review.id.to_string(),
            review.schedule_id.to_string(),
            review.review_number,
            review.period_start.to_string(),
            review.period_end.to_string(),
            review.attendance_percentage,
            goal_json,
            diagnosis_json,
            review.file_path,
        ],
    )?;
    Ok(())
}

pub fn find_generated_review(
    conn: &Connection,
    schedule_id: &Uuid,
) -> Result<Option<GeneratedReview>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, review_number, period_start, period_end, attendance_percentage,
                    goal_progress, diagnosis_progress, file_path
             FROM generated_reviews WHERE schedule_id = ?1",
            params![schedule_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            },
        )
        .optional()?;

    let Some((id, review_number, start, end, pct, goal_json, diagnosis_json, file_path)) = row
    else {
        return Ok(None);
    };

    let goal_progress: Vec<String> = serde_json::from_str(&goal_json)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("goal_progress JSON: {e}")))?;
    let diagnosis_progress: Vec<ProgressEntry> = serde_json::from_str(&diagnosis_json)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("diagnosis_progress JSON: {e}")))?;

    Ok(Some(GeneratedReview {
        id: parse_uuid(&id)?,
        schedule_id: *schedule_id,
        review_number,
        period_start: parse_date(&start)?,
        period_end: parse_date(&end)?,
        attendance_percentage: pct,
        goal_progress,
        diagnosis_progress,
        file_path,
    }))
}

/// Attaches the rendered artifact path once the document has been written.
pub fn set_review_file_path(
    conn: &Connection,
    id: &Uuid,
    file_path: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE generated_reviews SET file_path = ?1 WHERE id = ?2",
        params![file_path, id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("GeneratedReview", id));
    }
    Ok(())
}
