//! Progress levels for goals and diagnoses.
//!
//! Two flavours:
//! - Escalation: a stateless lookup from (review number, position counted from
//!   the end of the list) to a label. The same inputs always give the same
//!   labels, so a regenerated review never disagrees with the original.
//! - Assessment: a persisted 0-100 percentage per goal, bound to its label by a
//!   coherence rule, rolled up into a compliance report.

use std::ops::RangeInclusive;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::enums::ProgressLevel;
use crate::models::{GoalAssessment, PatientGoal, ProgressEntry};

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{level} is incoherent with {percentage}%: {reason}")]
    Incoherent {
        level: ProgressLevel,
        percentage: u8,
        reason: String,
    },
}

// ═══════════════════════════════════════════════════════════
// Escalation
// ═══════════════════════════════════════════════════════════

/// Label for the item at `position_from_end` (1 = last entry) in review `review_number`.
pub fn escalation_level(review_number: u32, position_from_end: usize) -> ProgressLevel {
    use ProgressLevel::*;

    match (review_number, position_from_end) {
        (0..=1, _) => NoProgress,
        (2, 1) => MinimalProgress,
        (2, _) => NoProgress,
        (3, 1..=2) => MinimalProgress,
        (3, _) => NoProgress,
        (4, 1) => ModerateProgress,
        (4, 2) => MinimalProgress,
        (4, _) => NoProgress,
        (_, 1..=2) => ModerateProgress,
        (_, 3) => MinimalProgress,
        _ => NoProgress,
    }
}

/// One progress entry per item, in list order.
pub fn compute_progress<S: AsRef<str>>(items: &[S], review_number: u32) -> Vec<ProgressEntry> {
    let len = items.len();
    items
        .iter()
        .enumerate()
        .map(|(index, item)| ProgressEntry {
            item: item.as_ref().to_string(),
            level: escalation_level(review_number, len - index),
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Assessment coherence
// ═══════════════════════════════════════════════════════════

/// Percentage band a label may carry.
pub fn percentage_band(level: ProgressLevel) -> RangeInclusive<u8> {
    match level {
        ProgressLevel::NoProgress => 0..=9,
        ProgressLevel::MinimalProgress => 10..=40,
        ProgressLevel::ModerateProgress => 41..=70,
        ProgressLevel::SignificantProgress => 71..=99,
        ProgressLevel::Achieved => 100..=100,
        ProgressLevel::Regression => 0..=99,
    }
}

/// Checks a new assessment against its label and the goal's previous percentage.
///
/// Regression additionally needs a prior assessment and must drop below it.
pub fn check_coherence(
    level: ProgressLevel,
    percentage: u8,
    previous: Option<u8>,
) -> Result<(), ProgressError> {
    let incoherent = |reason: String| ProgressError::Incoherent { level, percentage, reason };

    if percentage > 100 {
        return Err(incoherent("percentage exceeds 100".into()));
    }
    let band = percentage_band(level);
    if !band.contains(&percentage) {
        return Err(incoherent(format!(
            "expected {}-{}%",
            band.start(),
            band.end()
        )));
    }
    if level == ProgressLevel::Regression {
        match previous {
            None => return Err(incoherent("no earlier assessment to regress from".into())),
            Some(prev) if percentage >= prev => {
                return Err(incoherent(format!("previous assessment was {prev}%")))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Validates and stores an assessment for a goal.
pub fn record_assessment(
    conn: &Connection,
    goal_id: &Uuid,
    assessed_on: NaiveDate,
    percentage: u8,
    level: ProgressLevel,
    notes: Option<String>,
) -> Result<GoalAssessment, ProgressError> {
    db::get_goal(conn, goal_id)?;
    let history = db::get_assessments_for_goal(conn, goal_id)?;
    let previous = history
        .iter()
        .filter(|a| a.assessed_on <= assessed_on)
        .last()
        .map(|a| a.percentage);

    check_coherence(level, percentage, previous)?;

    let assessment = GoalAssessment {
        id: Uuid::new_v4(),
        goal_id: *goal_id,
        assessed_on,
        percentage,
        level,
        notes,
    };
    db::insert_assessment(conn, &assessment)?;
    tracing::info!(goal = %goal_id, %level, percentage, "Recorded goal assessment");
    Ok(assessment)
}

// ═══════════════════════════════════════════════════════════
// Compliance report
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    Achieved,
    InProgress,
    NotStarted,
    Regressed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalCompliance {
    pub goal_id: Uuid,
    pub goal_number: u8,
    pub status: GoalStatus,
    pub latest_percentage: Option<u8>,
    pub last_assessed_on: Option<NaiveDate>,
    pub assessment_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub goals: Vec<GoalCompliance>,
    pub achieved: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub regressed: usize,
    /// Mean of the latest percentage of every assessed goal.
    pub mean_percentage: Option<f64>,
    pub needs_attention: bool,
}

impl ComplianceReport {
    /// Goals whose latest assessment is older than `staleness_days` on `today`.
    pub fn stale_goals(&self, today: NaiveDate, staleness_days: i64) -> Vec<&GoalCompliance> {
        self.goals
            .iter()
            .filter(|g| {
                g.last_assessed_on
                    .is_some_and(|d| (today - d).num_days() > staleness_days)
            })
            .collect()
    }
}

fn status_of(latest: Option<&GoalAssessment>) -> GoalStatus {
    match latest.map(|a| a.level) {
        None | Some(ProgressLevel::NoProgress) => GoalStatus::NotStarted,
        Some(ProgressLevel::Achieved) => GoalStatus::Achieved,
        Some(ProgressLevel::Regression) => GoalStatus::Regressed,
        Some(_) => GoalStatus::InProgress,
    }
}

/// Rolls up the full assessment history into per-goal status and totals.
pub fn build_compliance_report(
    goals: &[PatientGoal],
    assessments: &[GoalAssessment],
    today: NaiveDate,
    staleness_days: i64,
) -> ComplianceReport {
    let mut entries = Vec::with_capacity(goals.len());
    for goal in goals {
        let history: Vec<&GoalAssessment> = assessments
            .iter()
            .filter(|a| a.goal_id == goal.id && a.assessed_on <= today)
            .collect();
        let latest = history.iter().max_by_key(|a| a.assessed_on).copied();

        entries.push(GoalCompliance {
            goal_id: goal.id,
            goal_number: goal.goal_number,
            status: status_of(latest),
            latest_percentage: latest.map(|a| a.percentage),
            last_assessed_on: latest.map(|a| a.assessed_on),
            assessment_count: history.len(),
        });
    }

    let count = |status: GoalStatus| entries.iter().filter(|g| g.status == status).count();
    let percentages: Vec<f64> = entries
        .iter()
        .filter_map(|g| g.latest_percentage.map(f64::from))
        .collect();
    let mean_percentage = if percentages.is_empty() {
        None
    } else {
        Some(percentages.iter().sum::<f64>() / percentages.len() as f64)
    };

    let mut report = ComplianceReport {
        achieved: count(GoalStatus::Achieved),
        in_progress: count(GoalStatus::InProgress),
        not_started: count(GoalStatus::NotStarted),
        regressed: count(GoalStatus::Regressed),
        goals: entries,
        mean_percentage,
        needs_attention: false,
    };
    report.needs_attention = report.regressed > 0
        || report.goals.iter().any(|g| g.assessment_count == 0)
        || !report.stale_goals(today, staleness_days).is_empty();
    report
}

/// Loads goals and their assessment history and builds the report.
pub fn goal_compliance_report(
    conn: &Connection,
    patient_id: &Uuid,
    today: NaiveDate,
    staleness_days: i64,
) -> Result<ComplianceReport, ProgressError> {
    let goals = db::get_goals(conn, patient_id)?;
    let assessments = db::get_assessments_for_patient(conn, patient_id)?;
    Ok(build_compliance_report(&goals, &assessments, today, staleness_days))
}
