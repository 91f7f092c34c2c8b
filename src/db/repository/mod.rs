//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per aggregate. All public functions are re-exported here.

mod assessment;
mod attendance;
mod diagnosis;
mod generated_review;
mod goal;
mod group;
mod notes;
mod patient;
mod schedule;

use chrono::NaiveDate;
use uuid::Uuid;

use super::DatabaseError;

pub use assessment::*;
pub use attendance::*;
pub use diagnosis::*;
pub use generated_review::*;
pub use goal::*;
pub use group::*;
pub use notes::*;
pub use patient::*;
pub use schedule::*;

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid date '{s}': {e}")))
}
