use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ProgressLevel;

/// Persisted progress measurement for a single goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalAssessment {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub assessed_on: NaiveDate,
    pub percentage: u8,
    pub level: ProgressLevel,
    pub notes: Option<String>,
}
