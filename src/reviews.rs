//! Review lifecycle: admission creates both series, reviews are gated and
//! generated once, and each generation completes its scheduled row.
//!
//! The domain record is committed before any document is rendered. A
//! rendering failure is logged and reported on the outcome but never rolls
//! the record back.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::CareConfig;
use crate::db::{self, DatabaseError};
use crate::document::{self, DiagnosisLine, GoalLine, ReviewData};
use crate::eligibility::{
    advisory_warnings, check_eligibility, AdvisoryWarning, AttendanceSummary, EligibilityReport,
    GateRules,
};
use crate::models::enums::ReviewKind;
use crate::models::{GeneratedReview, Patient, ReviewSeries, ScheduleRecord, ScheduledReview};
use crate::progress::{compute_progress, goal_compliance_report, ProgressError};
use crate::scheduling::{DateRule, ScheduleError};

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Review not eligible: {0}")]
    Ineligible(EligibilityReport),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Review #{review_number} is already completed")]
    AlreadyCompleted { review_number: u32 },

    #[error("Review #{review_number} cannot be completed while {open_before} earlier review(s) are open")]
    OutOfOrder { review_number: u32, open_before: usize },

    #[error("Invalid assessment: {0}")]
    Progress(String),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for ReviewError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity_type, id } => ReviewError::NotFound { entity: entity_type, id },
            other => ReviewError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for ReviewError {
    fn from(e: rusqlite::Error) -> Self {
        ReviewError::Database(DatabaseError::Sqlite(e))
    }
}

impl From<ProgressError> for ReviewError {
    fn from(e: ProgressError) -> Self {
        match e {
            ProgressError::Database(db) => db.into(),
            other => ReviewError::Progress(other.to_string()),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Admission and series maintenance
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSchedule {
    pub series: ReviewSeries,
    pub reviews: Vec<ScheduledReview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admission {
    pub patient: Patient,
    pub series: Vec<SeriesSchedule>,
}

fn schedule_rows(
    series_id: Uuid,
    rule: &DateRule,
    admission: NaiveDate,
    from: u32,
    to: u32,
) -> Result<Vec<ScheduledReview>, ScheduleError> {
    Ok(rule
        .checked_series(admission, to)?
        .into_iter()
        .filter(|d| d.review_number > from)
        .map(|d| ScheduledReview {
            id: Uuid::new_v4(),
            series_id,
            review_number: d.review_number,
            due_date: d.due_date,
            is_completed: false,
            completed_date: None,
        })
        .collect())
}

/// Stores the patient and creates both review series with their leading
/// scheduled reviews, all in one transaction.
pub fn admit_patient(
    conn: &Connection,
    patient: &Patient,
    config: &CareConfig,
) -> Result<Admission, ReviewError> {
    let rule = DateRule::from(config);
    let tx = conn.unchecked_transaction()?;

    db::insert_patient(&tx, patient)?;
    let mut series = Vec::with_capacity(ReviewKind::ALL.len());
    for kind in ReviewKind::ALL {
        let s = ReviewSeries {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            kind,
            admission_date: patient.admission_date,
        };
        db::insert_series(&tx, &s)?;
        let reviews = schedule_rows(s.id, &rule, patient.admission_date, 0, config.initial_series_length)?;
        for review in &reviews {
            db::insert_scheduled_review(&tx, review)?;
        }
        series.push(SeriesSchedule { series: s, reviews });
    }
    tx.commit()?;

    tracing::info!(
        patient = %patient.id,
        admission = %patient.admission_date,
        reviews_per_series = config.initial_series_length,
        "Admitted patient"
    );
    Ok(Admission { patient: patient.clone(), series })
}

/// Appends `additional` reviews to a series. Due dates are re-derived from the
/// admission date, never from stored rows.
pub fn extend_series(
    conn: &Connection,
    series_id: &Uuid,
    additional: u32,
    config: &CareConfig,
) -> Result<Vec<ScheduledReview>, ReviewError> {
    let series = db::get_series(conn, series_id)?;
    let current = db::max_review_number(conn, series_id)?;
    let rows = schedule_rows(
        series.id,
        &DateRule::from(config),
        series.admission_date,
        current,
        current.saturating_add(additional),
    )?;

    let tx = conn.unchecked_transaction()?;
    for review in &rows {
        db::insert_scheduled_review(&tx, review)?;
    }
    tx.commit()?;

    tracing::info!(series = %series_id, from = current + 1, added = rows.len(), "Extended review series");
    Ok(rows)
}

/// Earliest open review of a patient's series.
pub fn next_due(
    conn: &Connection,
    patient_id: &Uuid,
    kind: ReviewKind,
) -> Result<Option<ScheduledReview>, ReviewError> {
    let Some(series) = db::find_series_for_patient(conn, patient_id, kind)? else {
        return Ok(None);
    };
    let reviews = db::list_scheduled_reviews(conn, &series.id)?;
    Ok(reviews.into_iter().find(|r| !r.is_completed))
}

/// Open reviews whose due date is strictly before `today`, across all patients.
pub fn overdue_reviews(conn: &Connection, today: NaiveDate) -> Result<Vec<ScheduleRecord>, ReviewError> {
    let open = db::list_open_reviews_due_by(conn, today)?;
    Ok(open.into_iter().filter(|r| r.due_date < today).collect())
}

// ═══════════════════════════════════════════════════════════
// Eligibility and generation
// ═══════════════════════════════════════════════════════════

/// Everything the gate and the document need, loaded once.
struct ReviewContext {
    patient: Patient,
    series: ReviewSeries,
    schedule: ScheduledReview,
    attendance: AttendanceSummary,
    goal_count: usize,
}

fn load_context(conn: &Connection, schedule_id: &Uuid) -> Result<ReviewContext, ReviewError> {
    let schedule = db::get_scheduled_review(conn, schedule_id)?;
    let series = db::get_series(conn, &schedule.series_id)?;
    let patient = db::get_patient(conn, &series.patient_id)?;

    let period_start = match schedule.review_number {
        0 | 1 => series.admission_date,
        n => db::find_review_by_number(conn, &series.id, n - 1)?
            .map(|prev| prev.due_date)
            .unwrap_or(series.admission_date),
    };
    let period_end = schedule.due_date;
    let records = db::get_attendance_range(conn, &patient.id, period_start, period_end)?;
    let attendance = AttendanceSummary::from_records(&records, period_start, period_end);
    let goal_count = db::count_goals(conn, &patient.id)?;

    Ok(ReviewContext { patient, series, schedule, attendance, goal_count })
}

/// Runs the gate for a scheduled review without generating anything.
pub fn check_review_eligibility(
    conn: &Connection,
    schedule_id: &Uuid,
    today: NaiveDate,
    config: &CareConfig,
) -> Result<EligibilityReport, ReviewError> {
    let ctx = load_context(conn, schedule_id)?;
    Ok(check_eligibility(
        ctx.series.admission_date,
        today,
        &ctx.schedule,
        &ctx.attendance,
        ctx.goal_count,
        &GateRules::from(config),
    ))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub kind: ReviewKind,
    pub generated: GeneratedReview,
    pub advisories: Vec<AdvisoryWarning>,
    /// Set when the record was stored but its document could not be produced.
    pub document_error: Option<String>,
}

/// Gates, persists and renders one scheduled review.
pub fn generate_review(
    conn: &Connection,
    schedule_id: &Uuid,
    today: NaiveDate,
    config: &CareConfig,
    exports_dir: &Path,
) -> Result<ReviewOutcome, ReviewError> {
    let ctx = load_context(conn, schedule_id)?;
    let review_number = ctx.schedule.review_number;

    let report = check_eligibility(
        ctx.series.admission_date,
        today,
        &ctx.schedule,
        &ctx.attendance,
        ctx.goal_count,
        &GateRules::from(config),
    );
    if !report.ok {
        tracing::warn!(schedule = %schedule_id, %report, "Review generation blocked");
        return Err(ReviewError::Ineligible(report));
    }

    if !config.allow_out_of_order_completion {
        let open_before = db::count_open_reviews_before(conn, &ctx.series.id, review_number)?;
        if open_before > 0 {
            return Err(ReviewError::OutOfOrder { review_number, open_before });
        }
    }

    let goals = db::get_goals(conn, &ctx.patient.id)?;
    let diagnoses = db::get_diagnoses(conn, &ctx.patient.id)?;
    let compliance = goal_compliance_report(conn, &ctx.patient.id, today, config.assessment_staleness_days)?;
    let advisories = advisory_warnings(&compliance, today, config.assessment_staleness_days);
    for advisory in &advisories {
        tracing::warn!(patient = %ctx.patient.id, %advisory, "Goal compliance advisory");
    }

    let goal_texts: Vec<&str> = goals.iter().map(|g| g.text.as_str()).collect();
    let goal_progress = compute_progress(&goal_texts, review_number);
    let diagnosis_items: Vec<String> = diagnoses
        .iter()
        .map(|d| format!("{} {}", d.code, d.description))
        .collect();
    let diagnosis_progress = compute_progress(&diagnosis_items, review_number);

    let mut generated = GeneratedReview {
        id: Uuid::new_v4(),
        schedule_id: *schedule_id,
        review_number,
        period_start: ctx.attendance.period_start,
        period_end: ctx.attendance.period_end,
        attendance_percentage: ctx.attendance.percentage(),
        goal_progress: goals
            .iter()
            .zip(&goal_progress)
            .map(|(g, p)| format!("Goal {}: {}", g.goal_number, p.level.label()))
            .collect(),
        diagnosis_progress: diagnosis_progress.clone(),
        file_path: None,
    };

    let tx = conn.unchecked_transaction()?;
    db::insert_generated_review(&tx, &generated)?;
    if !db::mark_review_completed(&tx, schedule_id, today)? {
        return Err(ReviewError::AlreadyCompleted { review_number });
    }
    tx.commit()?;
    tracing::info!(
        schedule = %schedule_id,
        kind = ctx.series.kind.as_str(),
        review_number,
        attendance = ctx.attendance.percentage(),
        "Generated review"
    );

    let data = ReviewData {
        kind: ctx.series.kind,
        patient_name: ctx.patient.full_name.clone(),
        program: ctx.patient.program_type,
        admission_date: ctx.series.admission_date,
        review_number,
        due_date: ctx.schedule.due_date,
        attendance: ctx.attendance,
        goals: goals
            .iter()
            .zip(&goal_progress)
            .map(|(g, p)| GoalLine {
                goal_number: g.goal_number,
                text: g.text.clone(),
                progress: p.level,
                percentage: compliance
                    .goals
                    .iter()
                    .find(|c| c.goal_id == g.id)
                    .and_then(|c| c.latest_percentage),
            })
            .collect(),
        diagnoses: diagnoses
            .iter()
            .zip(&diagnosis_progress)
            .map(|(d, p)| DiagnosisLine {
                code: d.code.clone(),
                description: d.description.clone(),
                is_primary: d.is_primary,
                progress: p.level,
            })
            .collect(),
        advisories: advisories.iter().map(|a| a.to_string()).collect(),
    };

    let document_error = match render_review(&data, config, exports_dir) {
        Ok(path) => {
            let path = path.to_string_lossy().into_owned();
            db::set_review_file_path(conn, &generated.id, &path)?;
            generated.file_path = Some(path);
            None
        }
        Err(e) => {
            tracing::error!(schedule = %schedule_id, error = %e, "Review document failed; record kept");
            Some(e.to_string())
        }
    };

    Ok(ReviewOutcome { kind: ctx.series.kind, generated, advisories, document_error })
}

fn render_review(
    data: &ReviewData,
    config: &CareConfig,
    exports_dir: &Path,
) -> Result<std::path::PathBuf, document::DocumentError> {
    let (doc, tag) = match data.kind {
        ReviewKind::TreatmentPlanReview => {
            (document::build_treatment_plan_review(data, config.required_goal_count)?, "TPR")
        }
        ReviewKind::MultidisciplinaryReview => {
            (document::build_mdt_note(data, config.required_goal_count)?, "MDT")
        }
    };
    let number = data.review_number.to_string();
    let due = data.due_date.to_string();
    let stem = document::file_stem(&[&data.patient_name, tag, &number, &due]);
    document::render_to_file(&doc, exports_dir, &stem, config.export_format)
}
