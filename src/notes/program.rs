//! Program metadata: active weekdays, the double-note day, and the activity catalog.

use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::enums::ProgramType;
use crate::models::WeekId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSchedule {
    pub program_type: ProgramType,
    pub active_days: Vec<Weekday>,
    /// The one active weekday on which two independent notes are produced.
    pub double_note_day: Weekday,
}

/// How a calendar day is treated by a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayKind {
    Inactive,
    Single,
    DoubleNote,
}

impl DayKind {
    pub fn notes_required(&self) -> usize {
        match self {
            DayKind::Inactive => 0,
            DayKind::Single => 1,
            DayKind::DoubleNote => 2,
        }
    }

    /// Allowed number of selected activities per note.
    pub fn activity_bounds(&self) -> Option<RangeInclusive<usize>> {
        match self {
            DayKind::Inactive => None,
            DayKind::Single => Some(2..=3),
            DayKind::DoubleNote => Some(1..=2),
        }
    }
}

impl ProgramSchedule {
    pub fn defaults() -> Vec<Self> {
        use Weekday::*;
        vec![
            Self {
                program_type: ProgramType::PartialHospitalization,
                active_days: vec![Mon, Tue, Wed, Thu, Fri],
                double_note_day: Fri,
            },
            Self {
                program_type: ProgramType::IntensiveOutpatient,
                active_days: vec![Mon, Tue, Thu],
                double_note_day: Thu,
            },
            Self {
                program_type: ProgramType::DayTreatment,
                active_days: vec![Mon, Tue, Wed, Thu],
                double_note_day: Thu,
            },
        ]
    }

    pub fn validate(&self, rest_day: Weekday) -> Result<(), String> {
        let name = self.program_type.as_str();
        if self.active_days.is_empty() {
            return Err(format!("{name}: no active days"));
        }
        if !self.active_days.contains(&self.double_note_day) {
            return Err(format!(
                "{name}: double-note day {} is not an active day",
                self.double_note_day
            ));
        }
        if self.active_days.contains(&rest_day) {
            return Err(format!("{name}: rest day {rest_day} cannot be an active day"));
        }
        Ok(())
    }

    pub fn day_kind(&self, date: NaiveDate) -> DayKind {
        let weekday = date.weekday();
        if weekday == self.double_note_day {
            DayKind::DoubleNote
        } else if self.active_days.contains(&weekday) {
            DayKind::Single
        } else {
            DayKind::Inactive
        }
    }

    /// Active calendar days of `week`, in date order.
    pub fn active_dates(&self, week: &WeekId) -> Vec<NaiveDate> {
        week.days()
            .filter(|d| self.active_days.contains(&d.weekday()))
            .collect()
    }
}

/// Catalog entry for a group activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub code: String,
    pub title: String,
    pub description: String,
}

impl Activity {
    pub fn new(code: &str, title: &str, description: &str) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Built-in activity catalog.
pub fn default_catalog() -> Vec<Activity> {
    vec![
        Activity::new("CBT", "Cognitive Behavioral Therapy", "Identifying and restructuring unhelpful thoughts"),
        Activity::new("DBT", "Dialectical Behavior Therapy", "Distress tolerance and emotion regulation skills"),
        Activity::new("PSY-ED", "Psychoeducation", "Understanding symptoms, medication and relapse signs"),
        Activity::new("MIND", "Mindfulness", "Present-moment awareness and grounding practice"),
        Activity::new("ART", "Expressive Arts", "Non-verbal expression through art materials"),
        Activity::new("LIFE", "Life Skills", "Daily living, planning and problem solving"),
    ]
}
