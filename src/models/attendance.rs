use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AttendanceStatus, ProgramType, WeekStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub justification: Option<String>,
    pub is_locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientGroup {
    pub id: Uuid,
    pub name: String,
    pub program_type: ProgramType,
}

/// A group's attendance week, identified by its first calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekId {
    pub group_id: Uuid,
    pub week_start: NaiveDate,
}

impl WeekId {
    pub fn new(group_id: Uuid, week_start: NaiveDate) -> Self {
        Self { group_id, week_start }
    }

    /// The seven calendar days of this week, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.week_start.iter_days().take(7)
    }

    pub fn week_end(&self) -> NaiveDate {
        self.week_start + chrono::Duration::days(6)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceWeek {
    pub week: WeekId,
    pub status: WeekStatus,
    pub locked_at: Option<String>,
}
