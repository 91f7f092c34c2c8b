//! Session-note commands.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attendance::week_start_of;
use crate::core_state::CoreState;
use crate::db;
use crate::models::{ResponseKey, SessionNote, WeekId};
use crate::notes::{self, Activity, BatchOutcome, DaySelection};
use crate::uniqueness::ResponseRegistry;

pub fn list_activities(state: &CoreState) -> Vec<Activity> {
    state.catalog().to_vec()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub key: ResponseKey,
    pub response: String,
}

/// Keys of every response that collides with another one in the batch.
/// Used by editors to flag duplicates while typing.
pub fn validate_responses(state: &CoreState, entries: Vec<ResponseEntry>) -> Result<Vec<ResponseKey>, String> {
    let min_len = state.read_config().map_err(|e| e.to_string())?.min_unique_response_len;
    let registry = ResponseRegistry::from_batch(entries.into_iter().map(|e| (e.key, e.response)), min_len);
    Ok(registry.duplicates().iter().copied().collect())
}

pub fn generate_week_notes(
    state: &CoreState,
    group_id: Uuid,
    week_start: NaiveDate,
    selections: Vec<DaySelection>,
) -> Result<BatchOutcome, String> {
    let week = WeekId::new(group_id, week_start_of(week_start));
    let config = state.config().map_err(|e| e.to_string())?;
    let conn = state.open_db().map_err(|e| e.to_string())?;
    notes::generate_week(
        &conn,
        &week,
        &selections,
        state.catalog(),
        state.pool(),
        &config,
        &state.exports_dir,
    )
    .map_err(|e| e.to_string())
}

pub fn get_session_notes(state: &CoreState, patient_id: Uuid, date: NaiveDate) -> Result<Vec<SessionNote>, String> {
    let conn = state.open_db().map_err(|e| e.to_string())?;
    db::get_session_notes(&conn, &patient_id, date).map_err(|e| e.to_string())
}
