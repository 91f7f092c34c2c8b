//! Drives session-note generation for one group week.
//!
//! The whole batch is validated before anything is written. A locked week is
//! refused, and responses must be unique across everything stored for the
//! week, not only within the call. Generation
//! then runs day by day, skipping patients who were not present or already
//! have their notes, and paces consecutive documents.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::program::{Activity, ProgramSchedule};
use super::rotation::{ParagraphPool, RotationState};
use super::{CountViolation, NoteError};
use crate::config::CareConfig;
use crate::db;
use crate::document::{self, ExportFormat, SessionNoteData};
use crate::models::enums::{AttendanceStatus, NoteStatus, WeekStatus};
use crate::models::{ActivityResponse, NoteParagraph, Patient, ResponseKey, SessionNote, WeekId};
use crate::uniqueness::ResponseRegistry;

// ═══════════════════════════════════════════════════════════
// Batch input
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedActivity {
    pub code: String,
    pub response: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteSelection {
    pub activities: Vec<SelectedActivity>,
}

/// Activities chosen for one patient on one day, one entry per note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySelection {
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub notes: Vec<NoteSelection>,
}

impl DaySelection {
    /// Response keys in day order; the activity index runs across notes.
    fn keyed_activities(&self) -> impl Iterator<Item = (ResponseKey, u8, &SelectedActivity)> + '_ {
        self.notes
            .iter()
            .enumerate()
            .flat_map(|(n, note)| note.activities.iter().map(move |a| (n as u8, a)))
            .enumerate()
            .map(move |(i, (n, a))| {
                let key = ResponseKey { patient_id: self.patient_id, date: self.date, activity_index: i as u32 };
                (key, n, a)
            })
    }
}

// ═══════════════════════════════════════════════════════════
// Batch output
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    NotPresent { status: Option<AttendanceStatus> },
    AlreadyGenerated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedDay {
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub note_index: u8,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub notes: Vec<SessionNote>,
    pub skipped: Vec<SkippedDay>,
    /// Notes stored as drafts because their document could not be rendered.
    pub failures: Vec<DocumentFailure>,
}

// ═══════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════

fn count_violations(program: &ProgramSchedule, week: &WeekId, selections: &[DaySelection]) -> Vec<CountViolation> {
    let mut violations = Vec::new();
    for sel in selections {
        let (patient_id, date) = (sel.patient_id, sel.date);
        if date < week.week_start || date > week.week_end() {
            violations.push(CountViolation::OutsideWeek { patient_id, date });
            continue;
        }
        let kind = program.day_kind(date);
        let Some(bounds) = kind.activity_bounds() else {
            violations.push(CountViolation::InactiveDay { patient_id, date });
            continue;
        };
        if sel.notes.len() != kind.notes_required() {
            violations.push(CountViolation::NoteCount {
                patient_id,
                date,
                expected: kind.notes_required(),
                found: sel.notes.len(),
            });
        }
        for (i, note) in sel.notes.iter().enumerate() {
            if !bounds.contains(&note.activities.len()) {
                violations.push(CountViolation::ActivityCount {
                    patient_id,
                    date,
                    note_index: i as u8,
                    min: *bounds.start(),
                    max: *bounds.end(),
                    found: note.activities.len(),
                });
            }
        }
    }
    violations
}

fn unknown_codes(catalog: &[Activity], selections: &[DaySelection]) -> Vec<String> {
    let unknown: BTreeSet<String> = selections
        .iter()
        .flat_map(|s| s.notes.iter().flat_map(|n| n.activities.iter()))
        .filter(|a| !catalog.iter().any(|c| c.code == a.code))
        .map(|a| a.code.clone())
        .collect();
    unknown.into_iter().collect()
}

/// Keys whose response collides with another response of the week, once the
/// pending days replace whatever is stored for them.
fn duplicate_responses(
    conn: &Connection,
    week: &WeekId,
    pending: &[&DaySelection],
    min_len: usize,
) -> Result<Vec<ResponseKey>, NoteError> {
    let replaced: HashSet<(Uuid, NaiveDate)> = pending.iter().map(|s| (s.patient_id, s.date)).collect();
    let stored = db::get_group_responses(conn, &week.group_id, week.week_start, week.week_end())?
        .into_iter()
        .filter(|r| !replaced.contains(&(r.key.patient_id, r.key.date)))
        .map(|r| (r.key, r.response));
    let mut registry = ResponseRegistry::from_batch(stored, min_len);

    let mut offending = BTreeSet::new();
    for sel in pending {
        for (key, _, a) in sel.keyed_activities() {
            let Some(text) = &a.response else {
                continue;
            };
            let clashes = registry.set_response(key, text.as_str());
            if !clashes.is_empty() {
                offending.insert(key);
                offending.extend(clashes);
            }
        }
    }
    Ok(offending.into_iter().collect())
}

/// Replaces the stored responses of one day with the selection's.
fn store_responses(conn: &Connection, sel: &DaySelection) -> Result<(), NoteError> {
    db::delete_day_responses(conn, &sel.patient_id, sel.date)?;
    for (key, note_index, a) in sel.keyed_activities() {
        if let Some(response) = &a.response {
            db::upsert_response(
                conn,
                &ActivityResponse { key, note_index, activity_code: a.code.clone(), response: response.clone() },
            )?;
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Planning
// ═══════════════════════════════════════════════════════════

/// Paragraphs for every note of one day.
///
/// Note `n` draws with rotation offset `n`, and never reuses a stock
/// paragraph already placed earlier that day.
pub fn plan_day(
    pool: &ParagraphPool,
    catalog: &[Activity],
    mut state: RotationState,
    selection: &DaySelection,
) -> Result<(Vec<Vec<NoteParagraph>>, RotationState), NoteError> {
    let mut used: Vec<String> = Vec::new();
    let mut notes: Vec<Vec<NoteParagraph>> = vec![Vec::new(); selection.notes.len()];

    for (_, note_index, selected) in selection.keyed_activities() {
        let activity = catalog
            .iter()
            .find(|a| a.code == selected.code)
            .ok_or_else(|| NoteError::UnknownActivity(vec![selected.code.clone()]))?;

        let (draw, next) = state.draw(pool, &activity.code, selection.patient_id, note_index as u32, &used);
        state = next;
        let paragraph = draw.map_or_else(|| activity.description.clone(), |d| d.paragraph);
        used.push(paragraph.clone());

        notes[note_index as usize].push(NoteParagraph {
            activity_code: activity.code.clone(),
            title: activity.title.clone(),
            paragraph,
            response: selected.response.clone().filter(|r| !r.trim().is_empty()),
        });
    }
    Ok((notes, state))
}

// ═══════════════════════════════════════════════════════════
// Generation
// ═══════════════════════════════════════════════════════════

/// Validates and generates the session notes of one group week.
///
/// Only days that are still to be generated write anything: their responses
/// and draft notes are stored together before the documents are rendered.
pub fn generate_week(
    conn: &Connection,
    week: &WeekId,
    selections: &[DaySelection],
    catalog: &[Activity],
    pool: &ParagraphPool,
    config: &CareConfig,
    exports_dir: &Path,
) -> Result<BatchOutcome, NoteError> {
    if db::get_week(conn, week)?.status == WeekStatus::Locked {
        return Err(NoteError::WeekLocked { week_start: week.week_start });
    }

    let group = db::get_group(conn, &week.group_id)?;
    let program = config.program(group.program_type).ok_or_else(|| NoteError::NotFound {
        entity: "ProgramSchedule".into(),
        id: group.program_type.as_str().into(),
    })?;
    let members: HashMap<Uuid, Patient> = db::get_group_members(conn, &week.group_id)?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    if let Some(outsider) = selections.iter().find(|s| !members.contains_key(&s.patient_id)) {
        return Err(NoteError::NotFound { entity: "GroupMember".into(), id: outsider.patient_id.to_string() });
    }

    let violations = count_violations(program, week, selections);
    if !violations.is_empty() {
        return Err(NoteError::ActivityCount(violations));
    }
    let unknown = unknown_codes(catalog, selections);
    if !unknown.is_empty() {
        return Err(NoteError::UnknownActivity(unknown));
    }

    let attendance: HashMap<(Uuid, NaiveDate), AttendanceStatus> =
        db::get_group_attendance(conn, &week.group_id, week.week_start, week.week_end())?
            .into_iter()
            .map(|r| ((r.patient_id, r.date), r.status))
            .collect();

    let mut outcome = BatchOutcome::default();
    let mut ordered: Vec<&DaySelection> = selections.iter().collect();
    ordered.sort_by_key(|s| (s.date, members.get(&s.patient_id).map(|p| p.full_name.clone())));

    let mut pending: Vec<&DaySelection> = Vec::new();
    let mut existing_notes: HashMap<(Uuid, NaiveDate), Vec<SessionNote>> = HashMap::new();
    for sel in ordered {
        let status = attendance.get(&(sel.patient_id, sel.date)).copied();
        if status != Some(AttendanceStatus::Present) {
            tracing::warn!(patient = %sel.patient_id, date = %sel.date, ?status, "Skipping note: patient not present");
            outcome.skipped.push(SkippedDay {
                patient_id: sel.patient_id,
                date: sel.date,
                reason: SkipReason::NotPresent { status },
            });
            continue;
        }

        let existing = db::get_session_notes(conn, &sel.patient_id, sel.date)?;
        if existing.iter().any(|n| n.status == NoteStatus::Generated) {
            outcome.skipped.push(SkippedDay {
                patient_id: sel.patient_id,
                date: sel.date,
                reason: SkipReason::AlreadyGenerated,
            });
            continue;
        }
        existing_notes.insert((sel.patient_id, sel.date), existing);
        pending.push(sel);
    }

    let duplicates = duplicate_responses(conn, week, &pending, config.min_unique_response_len)?;
    if !duplicates.is_empty() {
        tracing::warn!(count = duplicates.len(), "Note generation blocked by duplicate responses");
        return Err(NoteError::DuplicateResponses(duplicates));
    }

    let member_ids: Vec<Uuid> = members.keys().copied().collect();
    let mut state = RotationState::from_cursors(db::load_rotation_cursors(conn, &member_ids)?);
    let pacing = Duration::from_millis(config.pacing_delay_ms);
    let mut rendered = 0usize;

    for sel in pending {
        let Some(patient) = members.get(&sel.patient_id) else {
            continue;
        };
        let existing = existing_notes.remove(&(sel.patient_id, sel.date)).unwrap_or_default();
        let (paragraphs, next) = plan_day(pool, catalog, state, sel)?;
        state = next;
        let notes_that_day = paragraphs.len() as u8;

        let drafts: Vec<SessionNote> = paragraphs
            .into_iter()
            .enumerate()
            .map(|(i, paragraphs)| {
                let note_index = i as u8;
                SessionNote {
                    id: existing
                        .iter()
                        .find(|n| n.note_index == note_index)
                        .map_or_else(Uuid::new_v4, |n| n.id),
                    patient_id: sel.patient_id,
                    date: sel.date,
                    note_index,
                    status: NoteStatus::Draft,
                    rotation_offset: note_index as u32,
                    paragraphs,
                    file_path: None,
                }
            })
            .collect();

        let tx = conn.unchecked_transaction()?;
        store_responses(&tx, sel)?;
        for note in &drafts {
            db::upsert_session_note(&tx, note)?;
        }
        tx.commit()?;

        for mut note in drafts {
            if rendered > 0 && !pacing.is_zero() {
                std::thread::sleep(pacing);
            }
            rendered += 1;

            match render_note(patient, program, &note, notes_that_day, config.export_format, exports_dir) {
                Ok(path) => {
                    note.status = NoteStatus::Generated;
                    note.file_path = Some(path.to_string_lossy().into_owned());
                    db::upsert_session_note(conn, &note)?;
                    tracing::info!(patient = %note.patient_id, date = %note.date, note_index = note.note_index, "Generated session note");
                }
                Err(e) => {
                    tracing::error!(patient = %note.patient_id, date = %note.date, note_index = note.note_index, error = %e, "Session note document failed; draft kept");
                    outcome.failures.push(DocumentFailure {
                        patient_id: note.patient_id,
                        date: note.date,
                        note_index: note.note_index,
                        error: e.to_string(),
                    });
                }
            }
            outcome.notes.push(note);
        }
    }

    db::save_rotation_cursors(conn, &state.into_cursors())?;
    tracing::info!(
        group = %week.group_id,
        week = %week.week_start,
        notes = outcome.notes.len(),
        skipped = outcome.skipped.len(),
        "Finished note batch"
    );
    Ok(outcome)
}

fn render_note(
    patient: &Patient,
    program: &ProgramSchedule,
    note: &SessionNote,
    notes_that_day: u8,
    format: ExportFormat,
    exports_dir: &Path,
) -> Result<std::path::PathBuf, document::DocumentError> {
    let data = SessionNoteData {
        patient_name: patient.full_name.clone(),
        program: program.program_type,
        date: note.date,
        note_index: note.note_index,
        notes_that_day,
        paragraphs: note.paragraphs.clone(),
    };
    let doc = document::build_session_note(&data)?;
    let date = note.date.to_string();
    let index = format!("note{}", note.note_index + 1);
    let stem = document::file_stem(&[&patient.full_name, &date, &index]);
    document::render_to_file(&doc, exports_dir, &stem, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{record_attendance, AttendanceEdit};
    use crate::db::repository::fixtures::{date, make_patient};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::ProgramType;
    use crate::models::PatientGroup;
    use crate::notes::program::default_catalog;

    fn config() -> CareConfig {
        CareConfig { pacing_delay_ms: 0, ..CareConfig::default() }
    }

    fn act(code: &str, response: Option<&str>) -> SelectedActivity {
        SelectedActivity { code: code.into(), response: response.map(String::from) }
    }

    fn note(acts: Vec<SelectedActivity>) -> NoteSelection {
        NoteSelection { activities: acts }
    }

    struct Fixture {
        conn: Connection,
        week: WeekId,
        a: Patient,
        b: Patient,
    }

    // Week of Monday 2025-01-06; Friday 2025-01-10 is the double-note day
    fn fixture() -> Fixture {
        let conn = open_memory_database().unwrap();
        let group = PatientGroup {
            id: Uuid::new_v4(),
            name: "PHP A".into(),
            program_type: ProgramType::PartialHospitalization,
        };
        db::insert_group(&conn, &group).unwrap();
        let a = make_patient(&conn, "Avi", date(2025, 1, 1));
        let b = make_patient(&conn, "Batya", date(2025, 1, 1));
        db::add_group_member(&conn, &group.id, &a.id).unwrap();
        db::add_group_member(&conn, &group.id, &b.id).unwrap();
        Fixture { conn, week: WeekId::new(group.id, date(2025, 1, 6)), a, b }
    }

    fn mark(f: &Fixture, p: &Patient, d: NaiveDate, status: AttendanceStatus) {
        let edit = AttendanceEdit { patient_id: p.id, date: d, status, justification: Some("Noted".into()) };
        record_attendance(&f.conn, &f.week.group_id, &edit).unwrap();
    }

    fn run(f: &Fixture, selections: &[DaySelection], dir: &Path) -> Result<BatchOutcome, NoteError> {
        generate_week(&f.conn, &f.week, selections, &default_catalog(), &ParagraphPool::builtin(), &config(), dir)
    }

    #[test]
    fn double_note_day_yields_two_disjoint_documents() {
        let f = fixture();
        let friday = date(2025, 1, 10);
        mark(&f, &f.a, friday, AttendanceStatus::Present);
        let dir = tempfile::tempdir().unwrap();

        let sel = DaySelection {
            patient_id: f.a.id,
            date: friday,
            notes: vec![note(vec![act("CBT", None), act("DBT", None)]), note(vec![act("CBT", None)])],
        };
        let outcome = run(&f, &[sel], dir.path()).unwrap();

        assert_eq!(outcome.notes.len(), 2);
        assert_eq!(outcome.notes[0].rotation_offset, 0);
        assert_eq!(outcome.notes[1].rotation_offset, 1);
        let first: Vec<&str> = outcome.notes[0].paragraphs.iter().map(|p| p.paragraph.as_str()).collect();
        assert!(outcome.notes[1].paragraphs.iter().all(|p| !first.contains(&p.paragraph.as_str())));
        assert!(outcome.notes.iter().all(|n| n.status == NoteStatus::Generated));
        let paths: Vec<&str> = outcome.notes.iter().filter_map(|n| n.file_path.as_deref()).collect();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("note1.docx") && paths[1].ends_with("note2.docx"));
    }

    #[test]
    fn absent_patient_is_skipped() {
        let f = fixture();
        let monday = date(2025, 1, 6);
        mark(&f, &f.a, monday, AttendanceStatus::Present);
        mark(&f, &f.b, monday, AttendanceStatus::Absent);
        let dir = tempfile::tempdir().unwrap();

        let selections = [f.a.id, f.b.id].map(|id| DaySelection {
            patient_id: id,
            date: monday,
            notes: vec![note(vec![act("CBT", None), act("MIND", None)])],
        });
        let outcome = run(&f, &selections, dir.path()).unwrap();
        assert_eq!(outcome.notes.len(), 1);
        assert_eq!(outcome.notes[0].patient_id, f.a.id);
        assert_eq!(
            outcome.skipped,
            vec![SkippedDay {
                patient_id: f.b.id,
                date: monday,
                reason: SkipReason::NotPresent { status: Some(AttendanceStatus::Absent) },
            }]
        );
    }

    #[test]
    fn activity_counts_are_enforced_per_day_kind() {
        let f = fixture();
        let dir = tempfile::tempdir().unwrap();
        let selections = vec![
            // Ordinary day with a single activity
            DaySelection { patient_id: f.a.id, date: date(2025, 1, 6), notes: vec![note(vec![act("CBT", None)])] },
            // Double-note day with one note only
            DaySelection {
                patient_id: f.a.id,
                date: date(2025, 1, 10),
                notes: vec![note(vec![act("CBT", None), act("DBT", None), act("MIND", None)])],
            },
            // Saturday
            DaySelection { patient_id: f.b.id, date: date(2025, 1, 11), notes: vec![] },
        ];
        let Err(NoteError::ActivityCount(violations)) = run(&f, &selections, dir.path()) else {
            panic!("expected count violations");
        };
        assert_eq!(violations.len(), 4);
        assert!(violations.contains(&CountViolation::InactiveDay { patient_id: f.b.id, date: date(2025, 1, 11) }));
        assert!(violations.contains(&CountViolation::NoteCount {
            patient_id: f.a.id,
            date: date(2025, 1, 10),
            expected: 2,
            found: 1,
        }));
    }

    #[test]
    fn duplicate_responses_block_the_whole_batch() {
        let f = fixture();
        let monday = date(2025, 1, 6);
        mark(&f, &f.a, monday, AttendanceStatus::Present);
        mark(&f, &f.b, monday, AttendanceStatus::Present);
        let dir = tempfile::tempdir().unwrap();
        let text = "Shared a coping plan for evenings";

        let selections = [f.a.id, f.b.id].map(|id| DaySelection {
            patient_id: id,
            date: monday,
            notes: vec![note(vec![act("CBT", Some(text)), act("DBT", Some("ok"))])],
        });
        let Err(NoteError::DuplicateResponses(keys)) = run(&f, &selections, dir.path()) else {
            panic!("expected duplicates");
        };
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.activity_index == 0));
        assert!(db::get_session_notes(&f.conn, &f.a.id, monday).unwrap().is_empty());
        assert!(db::get_day_responses(&f.conn, &f.a.id, monday).unwrap().is_empty());
    }

    #[test]
    fn unknown_activity_is_rejected() {
        let f = fixture();
        let dir = tempfile::tempdir().unwrap();
        let sel = DaySelection {
            patient_id: f.a.id,
            date: date(2025, 1, 6),
            notes: vec![note(vec![act("CBT", None), act("YOGA", None)])],
        };
        let err = run(&f, &[sel], dir.path()).unwrap_err();
        assert!(matches!(err, NoteError::UnknownActivity(codes) if codes == vec!["YOGA".to_string()]));
    }

    #[test]
    fn generated_day_is_not_overwritten_and_cursors_persist() {
        let f = fixture();
        let monday = date(2025, 1, 6);
        mark(&f, &f.a, monday, AttendanceStatus::Present);
        let dir = tempfile::tempdir().unwrap();
        let sel = DaySelection {
            patient_id: f.a.id,
            date: monday,
            notes: vec![note(vec![act("CBT", Some("Named two triggers for anxiety")), act("DBT", None)])],
        };

        run(&f, &[sel.clone()], dir.path()).unwrap();
        let cursors = db::load_rotation_cursors(&f.conn, &[f.a.id]).unwrap();
        assert_eq!(cursors.get(&("CBT".to_string(), f.a.id)), Some(&1));

        let second = run(&f, &[sel], dir.path()).unwrap();
        assert!(second.notes.is_empty());
        assert_eq!(second.skipped[0].reason, SkipReason::AlreadyGenerated);

        let stored = db::get_session_notes(&f.conn, &f.a.id, monday).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(
            stored[0].paragraphs[0].response.as_deref(),
            Some("Named two triggers for anxiety")
        );
    }

    #[test]
    fn responses_must_be_unique_across_the_week() {
        let f = fixture();
        let (monday, tuesday) = (date(2025, 1, 6), date(2025, 1, 7));
        mark(&f, &f.a, monday, AttendanceStatus::Present);
        mark(&f, &f.b, tuesday, AttendanceStatus::Present);
        let dir = tempfile::tempdir().unwrap();
        let text = "Shared a coping plan for evenings";

        let first = DaySelection {
            patient_id: f.a.id,
            date: monday,
            notes: vec![note(vec![act("CBT", Some(text)), act("DBT", None)])],
        };
        run(&f, &[first], dir.path()).unwrap();

        let second = DaySelection {
            patient_id: f.b.id,
            date: tuesday,
            notes: vec![note(vec![act("MIND", None), act("CBT", Some("  shared a coping plan for EVENINGS "))])],
        };
        let Err(NoteError::DuplicateResponses(keys)) = run(&f, &[second], dir.path()) else {
            panic!("expected duplicates against the stored Monday response");
        };
        let expected: BTreeSet<ResponseKey> = [
            ResponseKey { patient_id: f.a.id, date: monday, activity_index: 0 },
            ResponseKey { patient_id: f.b.id, date: tuesday, activity_index: 1 },
        ]
        .into_iter()
        .collect();
        assert_eq!(keys.into_iter().collect::<BTreeSet<_>>(), expected);
        assert!(db::get_session_notes(&f.conn, &f.b.id, tuesday).unwrap().is_empty());
        assert!(db::get_day_responses(&f.conn, &f.b.id, tuesday).unwrap().is_empty());
    }

    #[test]
    fn resubmitting_a_pending_day_does_not_collide_with_itself() {
        let f = fixture();
        let monday = date(2025, 1, 6);
        mark(&f, &f.a, monday, AttendanceStatus::Present);
        let dir = tempfile::tempdir().unwrap();
        db::upsert_response(
            &f.conn,
            &ActivityResponse {
                key: ResponseKey { patient_id: f.a.id, date: monday, activity_index: 0 },
                note_index: 0,
                activity_code: "CBT".into(),
                response: "Practiced grounding before group".into(),
            },
        )
        .unwrap();

        let sel = DaySelection {
            patient_id: f.a.id,
            date: monday,
            notes: vec![note(vec![act("DBT", None), act("CBT", Some("Practiced grounding before group"))])],
        };
        let outcome = run(&f, &[sel], dir.path()).unwrap();
        assert_eq!(outcome.notes.len(), 1);

        let stored = db::get_day_responses(&f.conn, &f.a.id, monday).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].key.activity_index, 1);
    }

    #[test]
    fn skipped_days_keep_their_stored_responses() {
        let f = fixture();
        let monday = date(2025, 1, 6);
        mark(&f, &f.a, monday, AttendanceStatus::Present);
        mark(&f, &f.b, monday, AttendanceStatus::Absent);
        let dir = tempfile::tempdir().unwrap();
        let day = |patient_id, text: &str| DaySelection {
            patient_id,
            date: monday,
            notes: vec![note(vec![act("CBT", Some(text)), act("DBT", None)])],
        };

        run(&f, &[day(f.a.id, "Named two triggers for anxiety")], dir.path()).unwrap();
        let again = run(
            &f,
            &[day(f.a.id, "Completely different later text here"), day(f.b.id, "Stayed home with a migraine today")],
            dir.path(),
        )
        .unwrap();
        assert!(again.notes.is_empty());
        assert_eq!(again.skipped.len(), 2);

        let stored = db::get_day_responses(&f.conn, &f.a.id, monday).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].response, "Named two triggers for anxiety");
        assert!(db::get_day_responses(&f.conn, &f.b.id, monday).unwrap().is_empty());
    }

    #[test]
    fn locked_week_refuses_generation() {
        let f = fixture();
        let monday = date(2025, 1, 6);
        mark(&f, &f.a, monday, AttendanceStatus::Present);
        db::set_week_locked(&f.conn, &f.week, "2025-01-13T09:00:00").unwrap();
        let dir = tempfile::tempdir().unwrap();

        let sel = DaySelection {
            patient_id: f.a.id,
            date: monday,
            notes: vec![note(vec![act("CBT", Some("Named two triggers for anxiety")), act("DBT", None)])],
        };
        let err = run(&f, &[sel], dir.path()).unwrap_err();
        assert!(matches!(err, NoteError::WeekLocked { week_start } if week_start == monday));
        assert!(err.to_string().contains("is locked"));
        assert!(db::get_session_notes(&f.conn, &f.a.id, monday).unwrap().is_empty());
        assert!(db::get_day_responses(&f.conn, &f.a.id, monday).unwrap().is_empty());
    }

    #[test]
    fn plan_day_is_pure_over_rotation_state() {
        let pool = ParagraphPool::builtin();
        let catalog = default_catalog();
        let sel = DaySelection {
            patient_id: Uuid::new_v4(),
            date: date(2025, 1, 6),
            notes: vec![note(vec![act("CBT", None), act("ART", None)])],
        };
        let (first, _) = plan_day(&pool, &catalog, RotationState::default(), &sel).unwrap();
        let (again, _) = plan_day(&pool, &catalog, RotationState::default(), &sel).unwrap();
        assert_eq!(first, again);
        assert_eq!(first[0].len(), 2);
    }
}
