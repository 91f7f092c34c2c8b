use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_date, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::ReviewKind;
use crate::models::{ReviewSeries, ScheduleRecord, ScheduledReview};

// ─── Series ───────────────────────────────────────────────────────────────────

pub fn insert_series(conn: &Connection, series: &ReviewSeries) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO review_series (id, patient_id, kind, admission_date)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            series.id.to_string(),
            series.patient_id.to_string(),
            series.kind.as_str(),
            series.admission_date.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_series(conn: &Connection, series_id: &Uuid) -> Result<ReviewSeries, DatabaseError> {
    let (patient_id, kind, admission) = conn
        .query_row(
            "SELECT patient_id, kind, admission_date FROM review_series WHERE id = ?1",
            params![series_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DatabaseError::not_found("ReviewSeries", series_id),
            other => DatabaseError::from(other),
        })?;

    Ok(ReviewSeries {
        id: *series_id,
        patient_id: parse_uuid(&patient_id)?,
        kind: ReviewKind::from_str(&kind)?,
        admission_date: parse_date(&admission)?,
    })
}

pub fn find_series_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
    kind: ReviewKind,
) -> Result<Option<ReviewSeries>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, admission_date FROM review_series WHERE patient_id = ?1 AND kind = ?2",
            params![patient_id.to_string(), kind.as_str()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    row.map(|(id, admission)| {
        Ok(ReviewSeries {
            id: parse_uuid(&id)?,
            patient_id: *patient_id,
            kind,
            admission_date: parse_date(&admission)?,
        })
    })
    .transpose()
}

// ─── Scheduled reviews ────────────────────────────────────────────────────────

pub fn insert_scheduled_review(
    conn: &Connection,
    review: &ScheduledReview,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO scheduled_reviews (id, series_id, review_number, due_date, is_completed, completed_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            review.id.to_string(),
            review.series_id.to_string(),
            review.review_number,
            review.due_date.to_string(),
            review.is_completed,
            review.completed_date.map(|d| d.to_string()),
        ],
    )?;
    Ok(())
}

pub fn get_scheduled_review(
    conn: &Connection,
    id: &Uuid,
) -> Result<ScheduledReview, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, series_id, review_number, due_date, is_completed, completed_date
             FROM scheduled_reviews WHERE id = ?1",
            params![id.to_string()],
            map_review_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DatabaseError::not_found("ScheduledReview", id),
            other => DatabaseError::from(other),
        })?;
    review_from_row(row)
}

/// All reviews of a series ordered by review number.
pub fn list_scheduled_reviews(
    conn: &Connection,
    series_id: &Uuid,
) -> Result<Vec<ScheduledReview>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, series_id, review_number, due_date, is_completed, completed_date
         FROM scheduled_reviews WHERE series_id = ?1 ORDER BY review_number",
    )?;
    let rows = stmt.query_map(params![series_id.to_string()], map_review_row)?;

    let mut reviews = Vec::new();
    for row in rows {
        reviews.push(review_from_row(row?)?);
    }
    Ok(reviews)
}

pub fn find_review_by_number(
    conn: &Connection,
    series_id: &Uuid,
    review_number: u32,
) -> Result<Option<ScheduledReview>, DatabaseError> {
    conn.query_row(
        "SELECT id, series_id, review_number, due_date, is_completed, completed_date
         FROM scheduled_reviews WHERE series_id = ?1 AND review_number = ?2",
        params![series_id.to_string(), review_number],
        map_review_row,
    )
    .optional()?
    .map(review_from_row)
    .transpose()
}

pub fn max_review_number(conn: &Connection, series_id: &Uuid) -> Result<u32, DatabaseError> {
    let max: Option<u32> = conn.query_row(
        "SELECT MAX(review_number) FROM scheduled_reviews WHERE series_id = ?1",
        params![series_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0))
}

/// Number of reviews before `review_number` that are still open.
pub fn count_open_reviews_before(
    conn: &Connection,
    series_id: &Uuid,
    review_number: u32,
) -> Result<usize, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM scheduled_reviews
         WHERE series_id = ?1 AND review_number < ?2 AND is_completed = 0",
        params![series_id.to_string(), review_number],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Marks a review completed. Returns `false` if it was already completed;
/// an existing completion is never overwritten.
pub fn mark_review_completed(
    conn: &Connection,
    id: &Uuid,
    completed_date: NaiveDate,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE scheduled_reviews SET is_completed = 1, completed_date = ?1
         WHERE id = ?2 AND is_completed = 0",
        params![completed_date.to_string(), id.to_string()],
    )?;
    if changed == 1 {
        return Ok(true);
    }
    // Distinguish "already completed" from "no such row"
    get_scheduled_review(conn, id)?;
    Ok(false)
}

/// Open reviews due on or before `date`, across all patients, oldest first.
pub fn list_open_reviews_due_by(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Vec<ScheduleRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.series_id, s.patient_id, s.kind, r.review_number, r.due_date,
                r.is_completed, r.completed_date
         FROM scheduled_reviews r
         JOIN review_series s ON r.series_id = s.id
         WHERE r.is_completed = 0 AND r.due_date <= ?1
         ORDER BY r.due_date, s.kind, r.review_number",
    )?;
    let rows = stmt.query_map(params![date.to_string()], map_record_row)?;
    collect_records(rows)
}

/// Full schedule of a patient (both series), ordered by due date.
pub fn list_schedule_records(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<ScheduleRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.series_id, s.patient_id, s.kind, r.review_number, r.due_date,
                r.is_completed, r.completed_date
         FROM scheduled_reviews r
         JOIN review_series s ON r.series_id = s.id
         WHERE s.patient_id = ?1
         ORDER BY r.due_date, s.kind",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], map_record_row)?;
    collect_records(rows)
}

type ReviewRow = (String, String, u32, String, bool, Option<String>);
type RecordRow = (String, String, String, String, u32, String, bool, Option<String>);

fn map_review_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn review_from_row(row: ReviewRow) -> Result<ScheduledReview, DatabaseError> {
    let (id, series_id, review_number, due_date, is_completed, completed_date) = row;
    Ok(ScheduledReview {
        id: parse_uuid(&id)?,
        series_id: parse_uuid(&series_id)?,
        review_number,
        due_date: parse_date(&due_date)?,
        is_completed,
        completed_date: completed_date.as_deref().map(parse_date).transpose()?,
    })
}

fn map_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn collect_records(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<RecordRow>>,
) -> Result<Vec<ScheduleRecord>, DatabaseError> {
    let mut records = Vec::new();
    for row in rows {
        let (id, series_id, patient_id, kind, review_number, due_date, is_completed, completed) =
            row?;
        records.push(ScheduleRecord {
            schedule_id: parse_uuid(&id)?,
            series_id: parse_uuid(&series_id)?,
            patient_id: parse_uuid(&patient_id)?,
            kind: ReviewKind::from_str(&kind)?,
            review_number,
            due_date: parse_date(&due_date)?,
            is_completed,
            completed_date: completed.as_deref().map(parse_date).transpose()?,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::*;
    use crate::db::sqlite::open_memory_database;

    fn seed_series(conn: &Connection) -> ReviewSeries {
        let patient = make_patient(conn, "Omer Tal", date(2025, 1, 1));
        let series = ReviewSeries {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            kind: ReviewKind::TreatmentPlanReview,
            admission_date: patient.admission_date,
        };
        insert_series(conn, &series).unwrap();
        series
    }

    fn review(series: &ReviewSeries, number: u32, due: NaiveDate) -> ScheduledReview {
        ScheduledReview {
            id: Uuid::new_v4(),
            series_id: series.id,
            review_number: number,
            due_date: due,
            is_completed: false,
            completed_date: None,
        }
    }

    #[test]
    fn review_numbers_are_unique_per_series() {
        let conn = open_memory_database().unwrap();
        let series = seed_series(&conn);
        insert_scheduled_review(&conn, &review(&series, 1, date(2025, 1, 19))).unwrap();
        let dup = insert_scheduled_review(&conn, &review(&series, 1, date(2025, 1, 20)));
        assert!(dup.is_err());
    }

    #[test]
    fn completion_happens_at_most_once() {
        let conn = open_memory_database().unwrap();
        let series = seed_series(&conn);
        let r = review(&series, 1, date(2025, 1, 19));
        insert_scheduled_review(&conn, &r).unwrap();

        assert!(mark_review_completed(&conn, &r.id, date(2025, 1, 19)).unwrap());
        assert!(!mark_review_completed(&conn, &r.id, date(2025, 1, 25)).unwrap());

        let loaded = get_scheduled_review(&conn, &r.id).unwrap();
        assert!(loaded.is_completed);
        assert_eq!(loaded.completed_date, Some(date(2025, 1, 19)));
    }

    #[test]
    fn completing_unknown_review_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = mark_review_completed(&conn, &Uuid::new_v4(), date(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn open_reviews_due_by_excludes_completed_and_future() {
        let conn = open_memory_database().unwrap();
        let series = seed_series(&conn);
        let r1 = review(&series, 1, date(2025, 1, 19));
        let r2 = review(&series, 2, date(2025, 2, 18));
        let r3 = review(&series, 3, date(2025, 3, 20));
        for r in [&r1, &r2, &r3] {
            insert_scheduled_review(&conn, r).unwrap();
        }
        mark_review_completed(&conn, &r1.id, date(2025, 1, 19)).unwrap();

        let due = list_open_reviews_due_by(&conn, date(2025, 3, 1)).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].review_number, 2);
        assert_eq!(due[0].patient_id, series.patient_id);
        assert_eq!(count_open_reviews_before(&conn, &series.id, 3).unwrap(), 1);
        assert_eq!(max_review_number(&conn, &series.id).unwrap(), 3);
    }

    #[test]
    fn find_series_for_patient_by_kind() {
        let conn = open_memory_database().unwrap();
        let series = seed_series(&conn);
        let found = find_series_for_patient(&conn, &series.patient_id, ReviewKind::TreatmentPlanReview)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, series.id);
        assert!(find_series_for_patient(&conn, &series.patient_id, ReviewKind::MultidisciplinaryReview)
            .unwrap()
            .is_none());
    }
}
