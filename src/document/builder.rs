//! Assembles review and note data into document trees.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::{Document, SignatureLine, Table};
use super::DocumentError;
use crate::eligibility::AttendanceSummary;
use crate::models::enums::{ProgramType, ProgressLevel, ReviewKind};
use crate::models::NoteParagraph;

// ═══════════════════════════════════════════════════════════
// Input data
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalLine {
    pub goal_number: u8,
    pub text: String,
    pub progress: ProgressLevel,
    /// Latest recorded percentage, when the goal has been assessed.
    pub percentage: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisLine {
    pub code: String,
    pub description: String,
    pub is_primary: bool,
    pub progress: ProgressLevel,
}

/// Everything a review document shows, already validated and computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewData {
    pub kind: ReviewKind,
    pub patient_name: String,
    pub program: ProgramType,
    pub admission_date: NaiveDate,
    pub review_number: u32,
    pub due_date: NaiveDate,
    pub attendance: AttendanceSummary,
    pub goals: Vec<GoalLine>,
    pub diagnoses: Vec<DiagnosisLine>,
    /// Advisory findings printed in a closing section.
    pub advisories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionNoteData {
    pub patient_name: String,
    pub program: ProgramType,
    pub date: NaiveDate,
    pub note_index: u8,
    pub notes_that_day: u8,
    pub paragraphs: Vec<NoteParagraph>,
}

// ═══════════════════════════════════════════════════════════
// Builders
// ═══════════════════════════════════════════════════════════

const TREATMENT_PLAN_SIGNATURES: [&str; 3] = ["Primary Therapist", "Psychiatrist", "Patient"];
const MDT_SIGNATURES: [&str; 4] = ["Psychiatrist", "Primary Therapist", "Nursing", "Program Director"];
const SESSION_SIGNATURES: [&str; 1] = ["Group Facilitator"];

fn signature_lines(roles: &[&str]) -> Vec<SignatureLine> {
    roles.iter().map(|r| SignatureLine::role(r)).collect()
}

fn header_fields(data: &ReviewData) -> Vec<(String, String)> {
    vec![
        ("Patient".into(), data.patient_name.clone()),
        ("Program".into(), data.program.display_name().into()),
        ("Admission date".into(), data.admission_date.to_string()),
        ("Review".into(), format!("#{} (due {})", data.review_number, data.due_date)),
        (
            "Review period".into(),
            format!("{} to {}", data.attendance.period_start, data.attendance.period_end),
        ),
        (
            "Attendance".into(),
            format!(
                "{:.1}% ({} of {} recorded days)",
                data.attendance.percentage(),
                data.attendance.present,
                data.attendance.recorded_days()
            ),
        ),
    ]
}

fn diagnosis_table(data: &ReviewData) -> Table {
    let mut table = Table::new(&["Code", "Diagnosis", "Primary", "Progress"])
        .with_caption("Diagnoses and progress")
        .with_widths(&[1.2, 4.0, 1.0, 2.0]);
    for d in &data.diagnoses {
        table.push_row(vec![
            d.code.clone(),
            d.description.clone(),
            (if d.is_primary { "Yes" } else { "" }).into(),
            d.progress.label().into(),
        ]);
    }
    table
}

fn objectives_table(data: &ReviewData) -> Table {
    let mut table = Table::new(&["Goal", "Objective", "Progress"])
        .with_caption("Treatment objectives")
        .with_widths(&[0.8, 5.0, 2.2]);
    for g in &data.goals {
        let progress = match g.percentage {
            Some(pct) => format!("{} ({pct}%)", g.progress.label()),
            None => g.progress.label().to_string(),
        };
        table.push_row(vec![g.goal_number.to_string(), g.text.clone(), progress]);
    }
    table
}

fn check_review_data(data: &ReviewData, required_goals: usize) -> Result<(), DocumentError> {
    if data.goals.len() != required_goals {
        return Err(DocumentError::Assembly(format!(
            "review needs {required_goals} goals, got {}",
            data.goals.len()
        )));
    }
    if data.patient_name.trim().is_empty() {
        return Err(DocumentError::Assembly("patient name is empty".into()));
    }
    Ok(())
}

/// Treatment-plan review: header, diagnosis/progress table, objectives table,
/// summary and fixed signature block.
pub fn build_treatment_plan_review(data: &ReviewData, required_goals: usize) -> Result<Document, DocumentError> {
    check_review_data(data, required_goals)?;

    let mut doc = Document::new(ReviewKind::TreatmentPlanReview.display_name())
        .subtitle(format!("{}, review #{}", data.patient_name, data.review_number));
    doc.fields(header_fields(data));
    doc.heading("Diagnoses").table(diagnosis_table(data));
    doc.heading("Objectives").table(objectives_table(data));

    doc.heading("Summary").paragraph(format!(
        "During the review period the patient attended {:.1}% of recorded program days. \
         Progress toward each objective is summarised above; the treatment plan remains \
         in effect with the objectives listed.",
        data.attendance.percentage()
    ));

    if !data.advisories.is_empty() {
        doc.heading("Clinical notes");
        for advisory in &data.advisories {
            doc.paragraph(format!("- {advisory}"));
        }
    }

    doc.heading("Signatures").signatures(signature_lines(&TREATMENT_PLAN_SIGNATURES));
    doc.validate()?;
    Ok(doc)
}

/// Multidisciplinary team note generated alongside a treatment-plan review.
pub fn build_mdt_note(data: &ReviewData, required_goals: usize) -> Result<Document, DocumentError> {
    check_review_data(data, required_goals)?;

    let mut doc = Document::new(ReviewKind::MultidisciplinaryReview.display_name())
        .subtitle(format!("{}, review #{}", data.patient_name, data.review_number));
    doc.fields(header_fields(data));

    let mut status = Table::new(&["Item", "Status"])
        .with_caption("Team case review")
        .with_widths(&[5.0, 2.0]);
    for d in &data.diagnoses {
        status.push_row(vec![format!("{} {}", d.code, d.description), d.progress.label().into()]);
    }
    for g in &data.goals {
        status.push_row(vec![format!("Goal {}: {}", g.goal_number, g.text), g.progress.label().into()]);
    }
    doc.heading("Case review").table(status);

    doc.heading("Team recommendations").paragraph(
        "The team reviewed attendance, diagnoses and treatment objectives and agreed to \
         continue the current level of care.",
    );

    doc.heading("Attending team").signatures(signature_lines(&MDT_SIGNATURES));
    doc.validate()?;
    Ok(doc)
}

/// Daily session note. On a double-note day the subtitle names which of the
/// two notes this is.
pub fn build_session_note(data: &SessionNoteData) -> Result<Document, DocumentError> {
    if data.paragraphs.is_empty() {
        return Err(DocumentError::Assembly("session note without activities".into()));
    }

    let subtitle = if data.notes_that_day > 1 {
        format!("{}, {} (note {} of {})", data.patient_name, data.date, data.note_index + 1, data.notes_that_day)
    } else {
        format!("{}, {}", data.patient_name, data.date)
    };
    let mut doc = Document::new("Group Session Note").subtitle(subtitle);
    doc.fields(vec![
        ("Patient".into(), data.patient_name.clone()),
        ("Program".into(), data.program.display_name().into()),
        ("Date".into(), data.date.to_string()),
        ("Attendance".into(), "Present".into()),
    ]);

    for p in &data.paragraphs {
        doc.heading(format!("{} ({})", p.title, p.activity_code));
        doc.paragraph(p.paragraph.clone());
        if let Some(response) = p.response.as_deref().filter(|r| !r.trim().is_empty()) {
            doc.paragraph(format!("Patient response: {}", response.trim()));
        }
    }

    doc.signatures(signature_lines(&SESSION_SIGNATURES));
    doc.validate()?;
    Ok(doc)
}

/// Export filename, restricted to ASCII alphanumerics, `-` and `_`.
pub fn file_stem(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| {
            p.chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::model::Block;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn review_data() -> ReviewData {
        ReviewData {
            kind: ReviewKind::TreatmentPlanReview,
            patient_name: "Dana Levi".into(),
            program: ProgramType::PartialHospitalization,
            admission_date: date(2025, 1, 1),
            review_number: 2,
            due_date: date(2025, 2, 18),
            attendance: AttendanceSummary {
                period_start: date(2025, 1, 19),
                period_end: date(2025, 2, 18),
                present: 15,
                absent: 5,
            },
            goals: (1..=4)
                .map(|n| GoalLine {
                    goal_number: n,
                    text: format!("Objective {n}"),
                    progress: ProgressLevel::NoProgress,
                    percentage: None,
                })
                .collect(),
            diagnoses: vec![
                DiagnosisLine {
                    code: "F33.1".into(),
                    description: "Major depressive disorder, recurrent, moderate".into(),
                    is_primary: true,
                    progress: ProgressLevel::NoProgress,
                },
                DiagnosisLine {
                    code: "F41.1".into(),
                    description: "Generalized anxiety disorder".into(),
                    is_primary: false,
                    progress: ProgressLevel::MinimalProgress,
                },
            ],
            advisories: vec![],
        }
    }

    #[test]
    fn treatment_plan_has_both_tables_and_signatures() {
        let doc = build_treatment_plan_review(&review_data(), 4).unwrap();
        let tables: Vec<_> = doc.tables().collect();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[0].rows[1][3], "Minimal Progress");
        assert_eq!(tables[1].rows.len(), 4);
        assert!(matches!(
            doc.blocks.last(),
            Some(Block::Signatures { lines }) if lines.len() == 3
        ));
    }

    #[test]
    fn header_reports_attendance_percentage() {
        let doc = build_treatment_plan_review(&review_data(), 4).unwrap();
        let Some(Block::Fields { entries }) = doc.blocks.first() else {
            panic!("expected header fields");
        };
        assert!(entries.iter().any(|(k, v)| k == "Attendance" && v.starts_with("75.0%")));
    }

    #[test]
    fn wrong_goal_count_is_an_assembly_error() {
        let mut data = review_data();
        data.goals.pop();
        assert!(matches!(
            build_treatment_plan_review(&data, 4),
            Err(DocumentError::Assembly(_))
        ));
    }

    #[test]
    fn advisories_add_a_section() {
        let mut data = review_data();
        data.advisories.push("goal 2 has never been assessed".into());
        let doc = build_treatment_plan_review(&data, 4).unwrap();
        assert!(doc
            .blocks
            .iter()
            .any(|b| matches!(b, Block::Heading { text } if text == "Clinical notes")));
    }

    #[test]
    fn mdt_note_lists_every_item() {
        let doc = build_mdt_note(&review_data(), 4).unwrap();
        assert_eq!(doc.title, "Multidisciplinary Team Review");
        assert_eq!(doc.tables().next().unwrap().rows.len(), 6);
    }

    #[test]
    fn session_note_includes_responses() {
        let data = SessionNoteData {
            patient_name: "Dana Levi".into(),
            program: ProgramType::PartialHospitalization,
            date: date(2025, 1, 10),
            note_index: 1,
            notes_that_day: 2,
            paragraphs: vec![NoteParagraph {
                activity_code: "CBT".into(),
                title: "Cognitive Behavioral Therapy".into(),
                paragraph: "The group reviewed thought records.".into(),
                response: Some("Noticed catastrophizing before work".into()),
            }],
        };
        let doc = build_session_note(&data).unwrap();
        assert!(doc.subtitle.as_deref().unwrap().contains("note 2 of 2"));
        assert!(doc.blocks.iter().any(
            |b| matches!(b, Block::Paragraph { text } if text.starts_with("Patient response:"))
        ));
    }

    #[test]
    fn file_stem_replaces_unsafe_characters() {
        assert_eq!(file_stem(&["Dana Levi", "TPR", "2"]), "Dana_Levi_TPR_2");
        assert_eq!(file_stem(&["a/b"]), "a_b");
    }
}
