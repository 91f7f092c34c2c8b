use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ProgressLevel, ReviewKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSeries {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub kind: ReviewKind,
    pub admission_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledReview {
    pub id: Uuid,
    pub series_id: Uuid,
    pub review_number: u32,
    pub due_date: NaiveDate,
    pub is_completed: bool,
    pub completed_date: Option<NaiveDate>,
}

/// One progress label for one goal or diagnosis line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub item: String,
    pub level: ProgressLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedReview {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub review_number: u32,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub attendance_percentage: f64,
    pub goal_progress: Vec<String>,
    pub diagnosis_progress: Vec<ProgressEntry>,
    pub file_path: Option<String>,
}

/// Flattened schedule row joined with its series, as exported to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub schedule_id: Uuid,
    pub series_id: Uuid,
    pub patient_id: Uuid,
    pub kind: ReviewKind,
    pub review_number: u32,
    pub due_date: NaiveDate,
    pub is_completed: bool,
    pub completed_date: Option<NaiveDate>,
}
