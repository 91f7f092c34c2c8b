//! Preconditions checked before a review or a locked week is allowed.
//!
//! Every check runs; the report lists all failures, never just the first.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CareConfig;
use crate::models::enums::AttendanceStatus;
use crate::models::{AttendanceRecord, Patient, ScheduledReview};
use crate::progress::{ComplianceReport, GoalStatus};

// ═══════════════════════════════════════════════════════════
// Attendance summary
// ═══════════════════════════════════════════════════════════

/// Attendance counts over a review period. Discharged days are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub present: usize,
    pub absent: usize,
}

impl AttendanceSummary {
    pub fn from_records(
        records: &[AttendanceRecord],
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Self {
        let in_period = records
            .iter()
            .filter(|r| r.date >= period_start && r.date <= period_end);
        let mut summary = Self { period_start, period_end, present: 0, absent: 0 };
        for record in in_period {
            match record.status {
                AttendanceStatus::Present => summary.present += 1,
                AttendanceStatus::Absent => summary.absent += 1,
                AttendanceStatus::Discharged => {}
            }
        }
        summary
    }

    pub fn recorded_days(&self) -> usize {
        self.present + self.absent
    }

    /// Present share in percent; 0 when nothing was recorded.
    pub fn percentage(&self) -> f64 {
        match self.recorded_days() {
            0 => 0.0,
            total => self.present as f64 * 100.0 / total as f64,
        }
    }

    /// Inclusive threshold check, done on counts to avoid rounding at the boundary.
    pub fn meets(&self, threshold_percent: f64) -> bool {
        let total = self.recorded_days();
        total > 0 && self.present as f64 * 100.0 >= threshold_percent * total as f64
    }
}

// ═══════════════════════════════════════════════════════════
// Review gate
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateRules {
    pub min_days_since_admission: i64,
    pub min_attendance_percent: f64,
    pub required_goal_count: usize,
}

impl Default for GateRules {
    fn default() -> Self {
        Self::from(&CareConfig::default())
    }
}

impl From<&CareConfig> for GateRules {
    fn from(config: &CareConfig) -> Self {
        Self {
            min_days_since_admission: config.min_days_since_admission,
            min_attendance_percent: config.min_attendance_percent,
            required_goal_count: config.required_goal_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IneligibilityReason {
    DaysSinceAdmissionTooLow { days: i64, required: i64 },
    AlreadyCompleted { completed_date: Option<NaiveDate> },
    AttendanceBelowThreshold {
        percentage: f64,
        required: f64,
        period_start: NaiveDate,
        period_end: NaiveDate,
    },
    InsufficientGoals { found: usize, required: usize },
}

impl fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DaysSinceAdmissionTooLow { days, required } => {
                write!(f, "{days} days since admission, at least {required} required")
            }
            Self::AlreadyCompleted { completed_date: Some(d) } => {
                write!(f, "review already completed on {d}")
            }
            Self::AlreadyCompleted { completed_date: None } => write!(f, "review already completed"),
            Self::AttendanceBelowThreshold { percentage, required, period_start, period_end } => write!(
                f,
                "attendance {percentage:.1}% between {period_start} and {period_end}, at least {required}% required"
            ),
            Self::InsufficientGoals { found, required } => {
                write!(f, "{found} goals configured, exactly {required} required")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub ok: bool,
    pub reasons: Vec<IneligibilityReason>,
}

impl EligibilityReport {
    fn from_reasons(reasons: Vec<IneligibilityReason>) -> Self {
        Self { ok: reasons.is_empty(), reasons }
    }
}

impl fmt::Display for EligibilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            return write!(f, "eligible");
        }
        let parts: Vec<String> = self.reasons.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Runs every review precondition and reports all failures.
pub fn check_eligibility(
    admission_date: NaiveDate,
    today: NaiveDate,
    schedule: &ScheduledReview,
    attendance: &AttendanceSummary,
    goal_count: usize,
    rules: &GateRules,
) -> EligibilityReport {
    let mut reasons = Vec::new();

    let days = (today - admission_date).num_days();
    if days < rules.min_days_since_admission {
        reasons.push(IneligibilityReason::DaysSinceAdmissionTooLow {
            days,
            required: rules.min_days_since_admission,
        });
    }

    if schedule.is_completed {
        reasons.push(IneligibilityReason::AlreadyCompleted {
            completed_date: schedule.completed_date,
        });
    }

    if !attendance.meets(rules.min_attendance_percent) {
        reasons.push(IneligibilityReason::AttendanceBelowThreshold {
            percentage: attendance.percentage(),
            required: rules.min_attendance_percent,
            period_start: attendance.period_start,
            period_end: attendance.period_end,
        });
    }

    if goal_count != rules.required_goal_count {
        reasons.push(IneligibilityReason::InsufficientGoals {
            found: goal_count,
            required: rules.required_goal_count,
        });
    }

    EligibilityReport::from_reasons(reasons)
}

// ═══════════════════════════════════════════════════════════
// Advisory goal-compliance check
// ═══════════════════════════════════════════════════════════

/// Non-blocking findings surfaced alongside a generated review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdvisoryWarning {
    NeverAssessed { goal_number: u8 },
    Regressed { goal_number: u8 },
    StaleAssessment { goal_number: u8, last_assessed_on: NaiveDate, days: i64 },
}

impl fmt::Display for AdvisoryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeverAssessed { goal_number } => write!(f, "goal {goal_number} has never been assessed"),
            Self::Regressed { goal_number } => write!(f, "goal {goal_number} has regressed"),
            Self::StaleAssessment { goal_number, last_assessed_on, days } => write!(
                f,
                "goal {goal_number} last assessed {days} days ago ({last_assessed_on})"
            ),
        }
    }
}

pub fn advisory_warnings(
    report: &ComplianceReport,
    today: NaiveDate,
    staleness_days: i64,
) -> Vec<AdvisoryWarning> {
    let mut warnings = Vec::new();
    for goal in &report.goals {
        match goal.last_assessed_on {
            None => warnings.push(AdvisoryWarning::NeverAssessed { goal_number: goal.goal_number }),
            Some(last) => {
                let days = (today - last).num_days();
                if days > staleness_days {
                    warnings.push(AdvisoryWarning::StaleAssessment {
                        goal_number: goal.goal_number,
                        last_assessed_on: last,
                        days,
                    });
                }
            }
        }
        if goal.status == GoalStatus::Regressed {
            warnings.push(AdvisoryWarning::Regressed { goal_number: goal.goal_number });
        }
    }
    warnings
}

// ═══════════════════════════════════════════════════════════
// Week-lock slot check
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotViolation {
    MissingStatus { patient_id: Uuid, patient_name: String, date: NaiveDate },
    UnjustifiedAbsence { patient_id: Uuid, patient_name: String, date: NaiveDate },
}

impl fmt::Display for SlotViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStatus { patient_name, date, .. } => {
                write!(f, "{patient_name}: no attendance status on {date}")
            }
            Self::UnjustifiedAbsence { patient_name, date, .. } => {
                write!(f, "{patient_name}: absence on {date} has no justification")
            }
        }
    }
}

/// Every (patient, active day) slot must carry a status and every absence a
/// justification. Slots outside a patient's enrolment are not required.
pub fn check_week_slots(
    members: &[Patient],
    active_days: &[NaiveDate],
    records: &[AttendanceRecord],
) -> Vec<SlotViolation> {
    let by_slot: HashMap<(Uuid, NaiveDate), &AttendanceRecord> =
        records.iter().map(|r| ((r.patient_id, r.date), r)).collect();

    let mut violations = Vec::new();
    for &date in active_days {
        for patient in members.iter().filter(|p| p.is_enrolled_on(date)) {
            match by_slot.get(&(patient.id, date)) {
                None => violations.push(SlotViolation::MissingStatus {
                    patient_id: patient.id,
                    patient_name: patient.full_name.clone(),
                    date,
                }),
                Some(record)
                    if record.status == AttendanceStatus::Absent
                        && record
                            .justification
                            .as_deref()
                            .map_or(true, |j| j.trim().is_empty()) =>
                {
                    violations.push(SlotViolation::UnjustifiedAbsence {
                        patient_id: patient.id,
                        patient_name: patient.full_name.clone(),
                        date,
                    })
                }
                Some(_) => {}
            }
        }
    }
    violations
}
