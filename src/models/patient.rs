use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ProgramType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub program_type: ProgramType,
    pub admission_date: NaiveDate,
    pub discharge_date: Option<NaiveDate>,
}

impl Patient {
    /// Whether the patient is enrolled on `date` (admitted, not yet discharged).
    pub fn is_enrolled_on(&self, date: NaiveDate) -> bool {
        date >= self.admission_date && self.discharge_date.map_or(true, |d| date <= d)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientGoal {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub goal_number: u8,
    pub text: String,
}

/// Diagnosis as entered by the clinician; `position` preserves insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub position: i64,
    pub code: String,
    pub description: String,
    pub is_primary: bool,
}
