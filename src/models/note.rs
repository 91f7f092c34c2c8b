use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NoteStatus;

/// Identifies one free-text activity response within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResponseKey {
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub activity_index: u32,
}

impl std::fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "patient {} on {} activity #{}", self.patient_id, self.date, self.activity_index)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub key: ResponseKey,
    pub note_index: u8,
    pub activity_code: String,
    pub response: String,
}

/// One activity paragraph of a session note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteParagraph {
    pub activity_code: String,
    pub title: String,
    pub paragraph: String,
    pub response: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionNote {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub note_index: u8,
    pub status: NoteStatus,
    pub rotation_offset: u32,
    pub paragraphs: Vec<NoteParagraph>,
    pub file_path: Option<String>,
}
