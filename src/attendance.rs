//! Attendance recording, the editable week grid and the atomic week lock.
//!
//! A locked week is immutable. Locking re-validates every slot inside the same
//! transaction that flips the flags, so a week is either fully locked or not
//! locked at all.

use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::CareConfig;
use crate::db::{self, DatabaseError};
use crate::eligibility::{check_week_slots, SlotViolation};
use crate::models::enums::{AttendanceStatus, WeekStatus};
use crate::models::{AttendanceRecord, WeekId};

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("Attendance for week starting {week_start} is locked")]
    WeekLocked { week_start: NaiveDate },

    #[error("Week cannot be locked: {}", format_violations(.0))]
    LockRejected(Vec<SlotViolation>),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

fn format_violations(violations: &[SlotViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<DatabaseError> for AttendanceError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity_type, id } => AttendanceError::NotFound { entity: entity_type, id },
            other => AttendanceError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for AttendanceError {
    fn from(e: rusqlite::Error) -> Self {
        AttendanceError::Database(DatabaseError::Sqlite(e))
    }
}

/// Start of the Monday-based week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date.week(chrono::Weekday::Mon).first_day()
}

// ═══════════════════════════════════════════════════════════
// Recording
// ═══════════════════════════════════════════════════════════

/// A requested change to one (patient, date) slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEdit {
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub justification: Option<String>,
}

/// Stores an attendance edit for a member of `group_id`.
pub fn record_attendance(
    conn: &Connection,
    group_id: &Uuid,
    edit: &AttendanceEdit,
) -> Result<AttendanceRecord, AttendanceError> {
    if db::is_date_locked(conn, group_id, edit.date)? {
        return Err(AttendanceError::WeekLocked { week_start: week_start_of(edit.date) });
    }

    let record = AttendanceRecord {
        id: Uuid::new_v4(),
        patient_id: edit.patient_id,
        date: edit.date,
        status: edit.status,
        justification: edit.justification.clone().filter(|j| !j.trim().is_empty()),
        is_locked: false,
    };
    match db::upsert_attendance(conn, &record) {
        Ok(stored) => {
            tracing::debug!(patient = %edit.patient_id, date = %edit.date, status = edit.status.as_str(), "Recorded attendance");
            Ok(stored)
        }
        Err(DatabaseError::ConstraintViolation(_)) => {
            Err(AttendanceError::WeekLocked { week_start: week_start_of(edit.date) })
        }
        Err(e) => Err(e.into()),
    }
}

// ═══════════════════════════════════════════════════════════
// Week grid with optimistic edits
// ═══════════════════════════════════════════════════════════

type Slot = (Uuid, NaiveDate);

/// A local edit awaiting the store's verdict.
#[derive(Debug, Clone)]
pub struct PendingEdit {
    slot: Slot,
    previous: Option<AttendanceRecord>,
}

/// Attendance of one group week as shown for editing.
///
/// Edits are applied locally first, then reconciled with the stored result:
/// an accepted edit becomes the confirmed state, a rejected one reverts the
/// slot to the last confirmed record.
#[derive(Debug, Clone)]
pub struct WeekGrid {
    pub week: WeekId,
    pub status: WeekStatus,
    slots: HashMap<Slot, AttendanceRecord>,
}

impl WeekGrid {
    pub fn load(conn: &Connection, week: &WeekId) -> Result<Self, AttendanceError> {
        let state = db::get_week(conn, week)?;
        let records = db::get_group_attendance(conn, &week.group_id, week.week_start, week.week_end())?;
        let slots = records
            .into_iter()
            .map(|r| ((r.patient_id, r.date), r))
            .collect();
        Ok(Self { week: *week, status: state.status, slots })
    }

    pub fn get(&self, patient_id: Uuid, date: NaiveDate) -> Option<&AttendanceRecord> {
        self.slots.get(&(patient_id, date))
    }

    pub fn records(&self) -> impl Iterator<Item = &AttendanceRecord> {
        self.slots.values()
    }

    /// Applies `edit` to the local view only.
    pub fn apply_local(&mut self, edit: &AttendanceEdit) -> Result<PendingEdit, AttendanceError> {
        if self.status == WeekStatus::Locked {
            return Err(AttendanceError::WeekLocked { week_start: self.week.week_start });
        }
        let slot = (edit.patient_id, edit.date);
        let previous = self.slots.get(&slot).cloned();
        let local = AttendanceRecord {
            id: previous.as_ref().map_or_else(Uuid::new_v4, |p| p.id),
            patient_id: edit.patient_id,
            date: edit.date,
            status: edit.status,
            justification: edit.justification.clone(),
            is_locked: false,
        };
        self.slots.insert(slot, local);
        Ok(PendingEdit { slot, previous })
    }

    /// Reconciles a pending edit with the store's answer.
    pub fn resolve(
        &mut self,
        pending: PendingEdit,
        result: Result<AttendanceRecord, AttendanceError>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let key = pending.slot;
        match result {
            Ok(confirmed) => {
                self.slots.insert(key, confirmed.clone());
                Ok(confirmed)
            }
            Err(e) => {
                tracing::warn!(patient = %pending.slot.0, date = %pending.slot.1, error = %e, "Attendance edit rejected; reverting");
                match pending.previous {
                    Some(previous) => self.slots.insert(key, previous),
                    None => self.slots.remove(&key),
                };
                if matches!(e, AttendanceError::WeekLocked { .. }) {
                    self.status = WeekStatus::Locked;
                }
                Err(e)
            }
        }
    }

    /// Local apply, store call, then reconcile.
    pub fn submit(&mut self, conn: &Connection, edit: &AttendanceEdit) -> Result<AttendanceRecord, AttendanceError> {
        let pending = self.apply_local(edit)?;
        let result = record_attendance(conn, &self.week.group_id, edit);
        self.resolve(pending, result)
    }
}

// ═══════════════════════════════════════════════════════════
// Week lock
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockOutcome {
    pub week: WeekId,
    pub locked_records: usize,
    pub locked_at: String,
}

/// Current slot violations of a week, without locking anything.
pub fn week_violations(
    conn: &Connection,
    week: &WeekId,
    config: &CareConfig,
) -> Result<Vec<SlotViolation>, AttendanceError> {
    let group = db::get_group(conn, &week.group_id)?;
    let program = config.program(group.program_type).ok_or_else(|| AttendanceError::NotFound {
        entity: "ProgramSchedule".into(),
        id: group.program_type.as_str().into(),
    })?;
    let members = db::get_group_members(conn, &week.group_id)?;
    let days = program.active_dates(week);
    let records = db::get_group_attendance(conn, &week.group_id, week.week_start, week.week_end())?;
    Ok(check_week_slots(&members, &days, &records))
}

/// Transitions a week Draft → Locked. Every slot is re-validated inside the
/// locking transaction; any violation aborts the whole transition.
pub fn lock_week(conn: &Connection, week: &WeekId, config: &CareConfig) -> Result<LockOutcome, AttendanceError> {
    let tx = conn.unchecked_transaction()?;

    if db::get_week(&tx, week)?.status == WeekStatus::Locked {
        return Err(AttendanceError::WeekLocked { week_start: week.week_start });
    }

    let violations = week_violations(&tx, week, config)?;
    if !violations.is_empty() {
        tracing::warn!(group = %week.group_id, week = %week.week_start, count = violations.len(), "Week lock rejected");
        return Err(AttendanceError::LockRejected(violations));
    }

    let locked_records = db::lock_group_attendance(&tx, &week.group_id, week.week_start, week.week_end())?;
    let locked_at = chrono::Utc::now().to_rfc3339();
    db::set_week_locked(&tx, week, &locked_at)?;
    tx.commit()?;

    tracing::info!(group = %week.group_id, week = %week.week_start, locked_records, "Locked attendance week");
    Ok(LockOutcome { week: *week, locked_records, locked_at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{date, make_patient};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::ProgramType;
    use crate::models::{Patient, PatientGroup};

    // 2025-01-06 is a Monday
    fn setup(conn: &Connection) -> (WeekId, Patient, Patient) {
        let group = PatientGroup {
            id: Uuid::new_v4(),
            name: "Morning PHP".into(),
            program_type: ProgramType::PartialHospitalization,
        };
        db::insert_group(conn, &group).unwrap();
        let a = make_patient(conn, "Yael", date(2025, 1, 1));
        let b = make_patient(conn, "Omer", date(2025, 1, 1));
        db::add_group_member(conn, &group.id, &a.id).unwrap();
        db::add_group_member(conn, &group.id, &b.id).unwrap();
        (WeekId::new(group.id, date(2025, 1, 6)), a, b)
    }

    fn edit(patient: &Patient, date: NaiveDate, status: AttendanceStatus, why: Option<&str>) -> AttendanceEdit {
        AttendanceEdit {
            patient_id: patient.id,
            date,
            status,
            justification: why.map(String::from),
        }
    }

    fn fill_week(conn: &Connection, week: &WeekId, patients: &[&Patient]) {
        for day in week.days().take(5) {
            for p in patients {
                record_attendance(conn, &week.group_id, &edit(p, day, AttendanceStatus::Present, None)).unwrap();
            }
        }
    }

    #[test]
    fn week_start_is_monday() {
        assert_eq!(week_start_of(date(2025, 1, 10)), date(2025, 1, 6));
        assert_eq!(week_start_of(date(2025, 1, 6)), date(2025, 1, 6));
        assert_eq!(week_start_of(date(2025, 1, 12)), date(2025, 1, 6));
    }

    #[test]
    fn lock_lists_every_offending_slot() {
        let conn = open_memory_database().unwrap();
        let (week, a, b) = setup(&conn);
        fill_week(&conn, &week, &[&a]);
        record_attendance(&conn, &week.group_id, &edit(&a, date(2025, 1, 8), AttendanceStatus::Absent, None)).unwrap();

        let err = lock_week(&conn, &week, &CareConfig::default()).unwrap_err();
        let AttendanceError::LockRejected(violations) = err else {
            panic!("expected rejection");
        };
        // One unjustified absence for a, five missing days for b
        assert_eq!(violations.len(), 6);
        assert!(violations.contains(&SlotViolation::UnjustifiedAbsence {
            patient_id: a.id,
            patient_name: "Yael".into(),
            date: date(2025, 1, 8),
        }));
        assert_eq!(
            violations.iter().filter(|v| matches!(v, SlotViolation::MissingStatus { .. })).count(),
            5
        );

        // Nothing was locked
        assert_eq!(db::get_week(&conn, &week).unwrap().status, WeekStatus::Draft);
        assert!(!db::find_attendance(&conn, &a.id, date(2025, 1, 6)).unwrap().unwrap().is_locked);
    }

    #[test]
    fn complete_week_locks_and_becomes_immutable() {
        let conn = open_memory_database().unwrap();
        let (week, a, b) = setup(&conn);
        fill_week(&conn, &week, &[&a, &b]);
        record_attendance(
            &conn,
            &week.group_id,
            &edit(&b, date(2025, 1, 9), AttendanceStatus::Absent, Some("Medical appointment")),
        )
        .unwrap();

        let outcome = lock_week(&conn, &week, &CareConfig::default()).unwrap();
        assert_eq!(outcome.locked_records, 10);
        assert_eq!(db::get_week(&conn, &week).unwrap().status, WeekStatus::Locked);

        let err = record_attendance(&conn, &week.group_id, &edit(&a, date(2025, 1, 7), AttendanceStatus::Absent, Some("x")))
            .unwrap_err();
        assert!(matches!(err, AttendanceError::WeekLocked { .. }));

        let again = lock_week(&conn, &week, &CareConfig::default()).unwrap_err();
        assert!(matches!(again, AttendanceError::WeekLocked { .. }));
    }

    #[test]
    fn weekend_slots_are_not_required() {
        let conn = open_memory_database().unwrap();
        let (week, a, b) = setup(&conn);
        fill_week(&conn, &week, &[&a, &b]);
        assert!(week_violations(&conn, &week, &CareConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn grid_keeps_accepted_edits() {
        let conn = open_memory_database().unwrap();
        let (week, a, _) = setup(&conn);
        let mut grid = WeekGrid::load(&conn, &week).unwrap();
        let stored = grid
            .submit(&conn, &edit(&a, date(2025, 1, 6), AttendanceStatus::Present, None))
            .unwrap();
        assert_eq!(grid.get(a.id, date(2025, 1, 6)), Some(&stored));
    }

    #[test]
    fn grid_rolls_back_rejected_edit() {
        let conn = open_memory_database().unwrap();
        let (week, a, b) = setup(&conn);
        fill_week(&conn, &week, &[&a, &b]);

        // Grid loaded before another editor locks the week
        let mut grid = WeekGrid::load(&conn, &week).unwrap();
        lock_week(&conn, &week, &CareConfig::default()).unwrap();

        let before = grid.get(a.id, date(2025, 1, 7)).cloned();
        let err = grid
            .submit(&conn, &edit(&a, date(2025, 1, 7), AttendanceStatus::Absent, Some("Sick")))
            .unwrap_err();
        assert!(matches!(err, AttendanceError::WeekLocked { .. }));
        assert_eq!(grid.get(a.id, date(2025, 1, 7)).cloned(), before);
        assert_eq!(grid.status, WeekStatus::Locked);
    }

    #[test]
    fn rejected_new_slot_is_removed() {
        let conn = open_memory_database().unwrap();
        let (week, a, _) = setup(&conn);
        let mut grid = WeekGrid::load(&conn, &week).unwrap();
        let pending = grid
            .apply_local(&edit(&a, date(2025, 1, 6), AttendanceStatus::Present, None))
            .unwrap();
        assert!(grid.get(a.id, date(2025, 1, 6)).is_some());
        let _ = grid.resolve(
            pending,
            Err(AttendanceError::NotFound { entity: "Patient".into(), id: a.id.to_string() }),
        );
        assert!(grid.get(a.id, date(2025, 1, 6)).is_none());
    }
}
