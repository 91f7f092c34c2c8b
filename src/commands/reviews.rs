//! Review commands: admission, schedule queries, gating, generation and goal
//! assessments.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core_state::CoreState;
use crate::db;
use crate::eligibility::EligibilityReport;
use crate::models::enums::{ProgramType, ProgressLevel};
use crate::models::{GoalAssessment, Patient, ProgressEntry, ScheduleRecord, ScheduledReview};
use crate::progress::{self, ComplianceReport};
use crate::reviews::{self, Admission, ReviewOutcome};
use crate::scheduling::{DateRule, DueDate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisInput {
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionInput {
    pub full_name: String,
    pub program_type: ProgramType,
    pub admission_date: NaiveDate,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub diagnoses: Vec<DiagnosisInput>,
}

/// Admits a patient, creating both review series, then stores goals and
/// diagnoses in the order given.
pub fn admit_patient(state: &CoreState, input: AdmissionInput) -> Result<Admission, String> {
    if input.full_name.trim().is_empty() {
        return Err("Patient name is required".into());
    }
    if input.goals.len() > db::MAX_GOAL_NUMBER as usize {
        return Err(format!("At most {} goals are allowed", db::MAX_GOAL_NUMBER));
    }

    let config = state.config().map_err(|e| e.to_string())?;
    let conn = state.open_db().map_err(|e| e.to_string())?;
    let patient = Patient {
        id: Uuid::new_v4(),
        full_name: input.full_name.trim().to_string(),
        program_type: input.program_type,
        admission_date: input.admission_date,
        discharge_date: None,
    };
    let admission = reviews::admit_patient(&conn, &patient, &config).map_err(|e| e.to_string())?;

    for (i, text) in input.goals.iter().enumerate() {
        db::upsert_goal(&conn, &patient.id, i as u8 + 1, text).map_err(|e| e.to_string())?;
    }
    for d in &input.diagnoses {
        db::add_diagnosis(&conn, &patient.id, &d.code, &d.description, d.is_primary)
            .map_err(|e| e.to_string())?;
    }
    Ok(admission)
}

pub fn set_goal(state: &CoreState, patient_id: Uuid, goal_number: u8, text: String) -> Result<(), String> {
    if !(1..=db::MAX_GOAL_NUMBER).contains(&goal_number) {
        return Err(format!("Goal number must be between 1 and {}", db::MAX_GOAL_NUMBER));
    }
    let conn = state.open_db().map_err(|e| e.to_string())?;
    db::get_patient(&conn, &patient_id).map_err(|e| e.to_string())?;
    db::upsert_goal(&conn, &patient_id, goal_number, &text).map_err(|e| e.to_string())?;
    Ok(())
}

pub fn discharge_patient(state: &CoreState, patient_id: Uuid, date: NaiveDate) -> Result<(), String> {
    let conn = state.open_db().map_err(|e| e.to_string())?;
    db::set_discharge_date(&conn, &patient_id, date).map_err(|e| e.to_string())
}

/// Due dates computed from an admission date, without touching the store.
pub fn calculate_series(state: &CoreState, admission_date: NaiveDate, count: u32) -> Result<Vec<DueDate>, String> {
    let config = state.read_config().map_err(|e| e.to_string())?;
    DateRule::from(&*config)
        .checked_series(admission_date, count)
        .map_err(|e| e.to_string())
}

pub fn compute_progress(items: Vec<String>, review_number: u32) -> Result<Vec<ProgressEntry>, String> {
    if review_number == 0 {
        return Err("Review numbers start at 1".into());
    }
    Ok(progress::compute_progress(&items, review_number))
}

pub fn get_schedule(state: &CoreState, patient_id: Uuid) -> Result<Vec<ScheduleRecord>, String> {
    let conn = state.open_db().map_err(|e| e.to_string())?;
    db::list_schedule_records(&conn, &patient_id).map_err(|e| e.to_string())
}

pub fn extend_series(state: &CoreState, series_id: Uuid, additional: u32) -> Result<Vec<ScheduledReview>, String> {
    let config = state.config().map_err(|e| e.to_string())?;
    let conn = state.open_db().map_err(|e| e.to_string())?;
    reviews::extend_series(&conn, &series_id, additional, &config).map_err(|e| e.to_string())
}

pub fn list_overdue(state: &CoreState, today: NaiveDate) -> Result<Vec<ScheduleRecord>, String> {
    let conn = state.open_db().map_err(|e| e.to_string())?;
    reviews::overdue_reviews(&conn, today).map_err(|e| e.to_string())
}

pub fn check_eligibility(state: &CoreState, schedule_id: Uuid, today: NaiveDate) -> Result<EligibilityReport, String> {
    let config = state.config().map_err(|e| e.to_string())?;
    let conn = state.open_db().map_err(|e| e.to_string())?;
    reviews::check_review_eligibility(&conn, &schedule_id, today, &config).map_err(|e| e.to_string())
}

pub fn generate_review(state: &CoreState, schedule_id: Uuid, today: NaiveDate) -> Result<ReviewOutcome, String> {
    let config = state.config().map_err(|e| e.to_string())?;
    let conn = state.open_db().map_err(|e| e.to_string())?;
    reviews::generate_review(&conn, &schedule_id, today, &config, &state.exports_dir).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentInput {
    pub goal_id: Uuid,
    pub assessed_on: NaiveDate,
    pub percentage: u8,
    pub level: ProgressLevel,
    pub notes: Option<String>,
}

pub fn record_goal_assessment(state: &CoreState, input: AssessmentInput) -> Result<GoalAssessment, String> {
    let conn = state.open_db().map_err(|e| e.to_string())?;
    progress::record_assessment(
        &conn,
        &input.goal_id,
        input.assessed_on,
        input.percentage,
        input.level,
        input.notes,
    )
    .map_err(|e| e.to_string())
}

pub fn get_compliance_report(state: &CoreState, patient_id: Uuid, today: NaiveDate) -> Result<ComplianceReport, String> {
    let staleness = state.read_config().map_err(|e| e.to_string())?.assessment_staleness_days;
    let conn = state.open_db().map_err(|e| e.to_string())?;
    progress::goal_compliance_report(&conn, &patient_id, today, staleness).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_state::test_support::temp_state;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(goals: usize) -> AdmissionInput {
        AdmissionInput {
            full_name: "  Tamar Cohen ".into(),
            program_type: ProgramType::IntensiveOutpatient,
            admission_date: date(2025, 1, 1),
            goals: (1..=goals).map(|n| format!("Goal {n}")).collect(),
            diagnoses: vec![DiagnosisInput {
                code: "F43.10".into(),
                description: "Post-traumatic stress disorder".into(),
                is_primary: true,
            }],
        }
    }

    #[test]
    fn admission_stores_goals_and_schedule() {
        let (_dir, state) = temp_state();
        let admission = admit_patient(&state, input(4)).unwrap();
        assert_eq!(admission.patient.full_name, "Tamar Cohen");

        let schedule = get_schedule(&state, admission.patient.id).unwrap();
        assert_eq!(schedule.len(), 12);
        assert_eq!(schedule[0].due_date, date(2025, 1, 19));
    }

    #[test]
    fn too_many_goals_rejected_before_writing() {
        let (_dir, state) = temp_state();
        let err = admit_patient(&state, input(5)).unwrap_err();
        assert!(err.contains("At most 4 goals"));
    }

    #[test]
    fn eligibility_reports_missing_goals() {
        let (_dir, state) = temp_state();
        let admission = admit_patient(&state, input(3)).unwrap();
        let tpr = admission.series[0].reviews[0].id;
        let report = check_eligibility(&state, tpr, date(2025, 1, 19)).unwrap();
        assert!(!report.ok);
        assert!(report.to_string().contains("3 goals configured"));

        let err = generate_review(&state, tpr, date(2025, 1, 19)).unwrap_err();
        assert!(err.starts_with("Review not eligible"));
    }

    #[test]
    fn pure_commands_need_no_database() {
        let (_dir, state) = temp_state();
        let series = calculate_series(&state, date(2025, 1, 1), 2).unwrap();
        assert_eq!(series[1].due_date, date(2025, 2, 18));

        let entries = compute_progress(vec!["a".into(), "b".into(), "c".into()], 4).unwrap();
        let labels: Vec<_> = entries.iter().map(|e| e.level.label()).collect();
        assert_eq!(labels, vec!["No Progress", "Minimal Progress", "Moderate Progress"]);
        assert!(compute_progress(vec![], 0).is_err());
    }

    #[test]
    fn oversized_series_request_is_an_error() {
        let (_dir, state) = temp_state();
        let err = calculate_series(&state, date(2025, 1, 1), u32::MAX).unwrap_err();
        assert!(err.contains("exceeds the limit"));
        let err = calculate_series(&state, NaiveDate::MAX, 1).unwrap_err();
        assert!(err.contains("outside the supported calendar"));
    }

    #[test]
    fn assessments_feed_the_compliance_report() {
        let (_dir, state) = temp_state();
        let admission = admit_patient(&state, input(4)).unwrap();
        let conn = state.open_db().unwrap();
        let goals = db::get_goals(&conn, &admission.patient.id).unwrap();

        record_goal_assessment(
            &state,
            AssessmentInput {
                goal_id: goals[0].id,
                assessed_on: date(2025, 1, 15),
                percentage: 100,
                level: ProgressLevel::Achieved,
                notes: None,
            },
        )
        .unwrap();
        let err = record_goal_assessment(
            &state,
            AssessmentInput {
                goal_id: goals[1].id,
                assessed_on: date(2025, 1, 15),
                percentage: 90,
                level: ProgressLevel::MinimalProgress,
                notes: None,
            },
        )
        .unwrap_err();
        assert!(err.contains("incoherent"));

        let report = get_compliance_report(&state, admission.patient.id, date(2025, 1, 20)).unwrap();
        assert_eq!(report.achieved, 1);
        assert_eq!(report.not_started, 3);
    }
}
