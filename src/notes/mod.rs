//! Note Generation Orchestrator: daily and double-note session notes for a
//! group week, gated on attendance and response uniqueness.

pub mod orchestrator;
pub mod program;
pub mod rotation;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::document::DocumentError;
use crate::models::ResponseKey;

pub use orchestrator::{
    generate_week, plan_day, BatchOutcome, DaySelection, NoteSelection, SelectedActivity, SkipReason,
    SkippedDay,
};
pub use program::{default_catalog, Activity, DayKind, ProgramSchedule};
pub use rotation::{ParagraphPool, RotationState};

/// A note whose activity count is outside what its day allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CountViolation {
    /// The day needs a different number of notes.
    NoteCount { patient_id: Uuid, date: NaiveDate, expected: usize, found: usize },
    /// A note has too few or too many activities.
    ActivityCount { patient_id: Uuid, date: NaiveDate, note_index: u8, min: usize, max: usize, found: usize },
    /// The program has no session on this day.
    InactiveDay { patient_id: Uuid, date: NaiveDate },
    /// The day is not part of the batch's week.
    OutsideWeek { patient_id: Uuid, date: NaiveDate },
}

impl std::fmt::Display for CountViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteCount { patient_id, date, expected, found } => {
                write!(f, "patient {patient_id} on {date}: {found} notes, {expected} required")
            }
            Self::ActivityCount { patient_id, date, note_index, min, max, found } => write!(
                f,
                "patient {patient_id} on {date}, note {}: {found} activities, {min}-{max} allowed",
                note_index + 1
            ),
            Self::InactiveDay { patient_id, date } => {
                write!(f, "patient {patient_id} on {date}: no program session that day")
            }
            Self::OutsideWeek { patient_id, date } => {
                write!(f, "patient {patient_id} on {date}: outside the batch week")
            }
        }
    }
}

fn join_all<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ")
}

#[derive(Error, Debug)]
pub enum NoteError {
    #[error("Activity selection invalid: {}", join_all(.0))]
    ActivityCount(Vec<CountViolation>),

    #[error("Duplicate responses: {}", join_all(.0))]
    DuplicateResponses(Vec<ResponseKey>),

    #[error("Week starting {week_start} is locked")]
    WeekLocked { week_start: NaiveDate },

    #[error("Unknown activity code(s): {}", .0.join(", "))]
    UnknownActivity(Vec<String>),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}

impl From<DatabaseError> for NoteError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity_type, id } => NoteError::NotFound { entity: entity_type, id },
            other => NoteError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for NoteError {
    fn from(e: rusqlite::Error) -> Self {
        NoteError::Database(DatabaseError::Sqlite(e))
    }
}
