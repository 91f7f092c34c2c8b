//! Attendance commands: groups, slot edits and the weekly lock.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attendance::{self, AttendanceEdit, AttendanceError, WeekGrid};
use crate::core_state::CoreState;
use crate::db;
use crate::eligibility::SlotViolation;
use crate::models::enums::{ProgramType, WeekStatus};
use crate::models::{AttendanceRecord, PatientGroup, WeekId};

pub fn create_group(state: &CoreState, name: String, program_type: ProgramType) -> Result<PatientGroup, String> {
    if name.trim().is_empty() {
        return Err("Group name is required".into());
    }
    let conn = state.open_db().map_err(|e| e.to_string())?;
    let group = PatientGroup { id: Uuid::new_v4(), name: name.trim().to_string(), program_type };
    db::insert_group(&conn, &group).map_err(|e| e.to_string())?;
    tracing::info!(group = %group.id, program = program_type.as_str(), "Created group");
    Ok(group)
}

pub fn add_group_member(state: &CoreState, group_id: Uuid, patient_id: Uuid) -> Result<(), String> {
    let conn = state.open_db().map_err(|e| e.to_string())?;
    let group = db::get_group(&conn, &group_id).map_err(|e| e.to_string())?;
    let patient = db::get_patient(&conn, &patient_id).map_err(|e| e.to_string())?;
    if patient.program_type != group.program_type {
        return Err(format!(
            "{} is enrolled in {}, group runs {}",
            patient.full_name,
            patient.program_type.display_name(),
            group.program_type.display_name()
        ));
    }
    db::add_group_member(&conn, &group_id, &patient_id).map_err(|e| e.to_string())
}

pub fn record_attendance(state: &CoreState, group_id: Uuid, edit: AttendanceEdit) -> Result<AttendanceRecord, String> {
    let conn = state.open_db().map_err(|e| e.to_string())?;
    attendance::record_attendance(&conn, &group_id, &edit).map_err(|e| e.to_string())
}

/// Applies several edits to one week through the optimistic grid. Rejected
/// edits are reported without stopping the rest.
pub fn record_week_edits(
    state: &CoreState,
    group_id: Uuid,
    week_start: NaiveDate,
    edits: Vec<AttendanceEdit>,
) -> Result<WeekView, String> {
    let week = WeekId::new(group_id, attendance::week_start_of(week_start));
    let conn = state.open_db().map_err(|e| e.to_string())?;
    let mut grid = WeekGrid::load(&conn, &week).map_err(|e| e.to_string())?;

    let mut rejected = Vec::new();
    for edit in &edits {
        if let Err(e) = grid.submit(&conn, edit) {
            rejected.push(format!("{} on {}: {e}", edit.patient_id, edit.date));
        }
    }
    let config = state.config().map_err(|e| e.to_string())?;
    let violations = attendance::week_violations(&conn, &week, &config).map_err(|e| e.to_string())?;
    Ok(WeekView::from_grid(&grid, violations, rejected))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekView {
    pub week: WeekId,
    pub status: WeekStatus,
    pub records: Vec<AttendanceRecord>,
    /// Slots still blocking the lock.
    pub violations: Vec<SlotViolation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<String>,
}

impl WeekView {
    fn from_grid(grid: &WeekGrid, violations: Vec<SlotViolation>, rejected: Vec<String>) -> Self {
        let mut records: Vec<AttendanceRecord> = grid.records().cloned().collect();
        records.sort_by_key(|r| (r.date, r.patient_id));
        Self { week: grid.week, status: grid.status, records, violations, rejected }
    }
}

pub fn get_week(state: &CoreState, group_id: Uuid, week_start: NaiveDate) -> Result<WeekView, String> {
    let week = WeekId::new(group_id, attendance::week_start_of(week_start));
    let config = state.config().map_err(|e| e.to_string())?;
    let conn = state.open_db().map_err(|e| e.to_string())?;
    let grid = WeekGrid::load(&conn, &week).map_err(|e| e.to_string())?;
    let violations = attendance::week_violations(&conn, &week, &config).map_err(|e| e.to_string())?;
    Ok(WeekView::from_grid(&grid, violations, Vec::new()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockWeekResult {
    pub ok: bool,
    pub violations: Vec<SlotViolation>,
    pub locked_records: usize,
    pub locked_at: Option<String>,
}

/// Locks a week. Slot violations come back as data so the caller can show
/// them; other failures are errors.
pub fn lock_week(state: &CoreState, group_id: Uuid, week_start: NaiveDate) -> Result<LockWeekResult, String> {
    let week = WeekId::new(group_id, attendance::week_start_of(week_start));
    let config = state.config().map_err(|e| e.to_string())?;
    let conn = state.open_db().map_err(|e| e.to_string())?;

    match attendance::lock_week(&conn, &week, &config) {
        Ok(outcome) => Ok(LockWeekResult {
            ok: true,
            violations: Vec::new(),
            locked_records: outcome.locked_records,
            locked_at: Some(outcome.locked_at),
        }),
        Err(AttendanceError::LockRejected(violations)) => Ok(LockWeekResult {
            ok: false,
            violations,
            locked_records: 0,
            locked_at: None,
        }),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::reviews::{admit_patient, AdmissionInput};
    use crate::core_state::test_support::temp_state;
    use crate::models::enums::AttendanceStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup(state: &CoreState) -> (Uuid, Uuid) {
        let group = create_group(state, "Tuesday IOP".into(), ProgramType::IntensiveOutpatient).unwrap();
        let admission = admit_patient(
            state,
            AdmissionInput {
                full_name: "Dana Levi".into(),
                program_type: ProgramType::IntensiveOutpatient,
                admission_date: date(2025, 3, 1),
                goals: vec![],
                diagnoses: vec![],
            },
        )
        .unwrap();
        add_group_member(state, group.id, admission.patient.id).unwrap();
        (group.id, admission.patient.id)
    }

    fn edit(patient_id: Uuid, d: NaiveDate, status: AttendanceStatus, why: Option<&str>) -> AttendanceEdit {
        AttendanceEdit { patient_id, date: d, status, justification: why.map(String::from) }
    }

    #[test]
    fn member_program_must_match_group() {
        let (_dir, state) = temp_state();
        let group = create_group(&state, "PHP A".into(), ProgramType::PartialHospitalization).unwrap();
        let admission = admit_patient(
            &state,
            AdmissionInput {
                full_name: "Omer".into(),
                program_type: ProgramType::DayTreatment,
                admission_date: date(2025, 3, 1),
                goals: vec![],
                diagnoses: vec![],
            },
        )
        .unwrap();
        let err = add_group_member(&state, group.id, admission.patient.id).unwrap_err();
        assert!(err.contains("Day Treatment Program"));
    }

    #[test]
    fn lock_reports_violations_then_succeeds() {
        let (_dir, state) = temp_state();
        let (group_id, patient_id) = setup(&state);
        // 2025-03-10 is a Monday; IOP meets Mon, Tue, Thu.
        let monday = date(2025, 3, 10);

        let result = lock_week(&state, group_id, date(2025, 3, 12)).unwrap();
        assert!(!result.ok);
        assert_eq!(result.violations.len(), 3);

        let view = record_week_edits(
            &state,
            group_id,
            monday,
            vec![
                edit(patient_id, monday, AttendanceStatus::Present, None),
                edit(patient_id, date(2025, 3, 11), AttendanceStatus::Absent, Some("Flu")),
                edit(patient_id, date(2025, 3, 13), AttendanceStatus::Present, None),
            ],
        )
        .unwrap();
        assert_eq!(view.records.len(), 3);
        assert!(view.violations.is_empty());

        let result = lock_week(&state, group_id, monday).unwrap();
        assert!(result.ok);
        assert_eq!(result.locked_records, 3);

        let err = record_attendance(&state, group_id, edit(patient_id, monday, AttendanceStatus::Absent, Some("x")))
            .unwrap_err();
        assert!(err.contains("locked"));
        assert!(lock_week(&state, group_id, monday).is_err());
    }

    #[test]
    fn grid_reports_rejected_edits() {
        let (_dir, state) = temp_state();
        let (group_id, patient_id) = setup(&state);
        let monday = date(2025, 3, 10);
        for (d, s) in [(10, AttendanceStatus::Present), (11, AttendanceStatus::Present), (13, AttendanceStatus::Present)] {
            record_attendance(&state, group_id, edit(patient_id, date(2025, 3, d), s, None)).unwrap();
        }
        lock_week(&state, group_id, monday).unwrap();

        let view = record_week_edits(
            &state,
            group_id,
            monday,
            vec![edit(patient_id, monday, AttendanceStatus::Absent, Some("late note"))],
        );
        // A locked grid refuses local edits before reaching the store.
        let view = view.unwrap();
        assert_eq!(view.status, WeekStatus::Locked);
        assert_eq!(view.rejected.len(), 1);
        assert_eq!(view.records.iter().filter(|r| r.status == AttendanceStatus::Present).count(), 3);
    }
}
