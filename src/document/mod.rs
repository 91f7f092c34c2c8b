//! Document Assembler: structured trees built from review and note data,
//! exported as word-processing packages or PDF.

pub mod builder;
pub mod docx;
pub mod model;
pub mod pdf;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use builder::{
    build_mdt_note, build_session_note, build_treatment_plan_review, file_stem, DiagnosisLine,
    GoalLine, ReviewData, SessionNoteData,
};
pub use docx::generate_docx;
pub use model::{Block, Document, SignatureLine, Table};
pub use pdf::generate_document;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Document assembly failed: {0}")]
    Assembly(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cannot write document: {0}")]
    Io(#[from] std::io::Error),
}

/// File format of exported documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Docx,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }

    pub fn render(self, document: &Document) -> Result<Vec<u8>, DocumentError> {
        match self {
            Self::Docx => generate_docx(document),
            Self::Pdf => generate_document(document),
        }
    }
}

/// Writes rendered bytes to `dir/filename`, creating `dir` if needed.
pub fn export_to_file(bytes: &[u8], dir: &Path, filename: &str) -> Result<PathBuf, DocumentError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    std::fs::write(&path, bytes)?;
    Ok(path)
}

/// Renders and writes `document` as `<stem>.<ext>` under `dir`.
pub fn render_to_file(
    document: &Document,
    dir: &Path,
    stem: &str,
    format: ExportFormat,
) -> Result<PathBuf, DocumentError> {
    let bytes = format.render(document)?;
    let path = export_to_file(&bytes, dir, &format!("{stem}.{}", format.extension()))?;
    tracing::info!(path = %path.display(), ?format, "Exported document");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut doc = Document::new("Treatment Plan Review").subtitle("Dana Levi, review #1");
        doc.heading("Objectives").paragraph("Attend all scheduled sessions.");
        doc.signatures(vec![SignatureLine::role("Psychiatrist")]);
        doc
    }

    #[test]
    fn render_to_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("exports");
        let path = render_to_file(&sample(), &target, "review_1", ExportFormat::Docx).unwrap();
        assert!(path.ends_with("review_1.docx"));
        assert!(std::fs::read(&path).unwrap().starts_with(b"PK"));
    }

    #[test]
    fn pdf_stays_available() {
        let dir = tempfile::tempdir().unwrap();
        let path = render_to_file(&sample(), dir.path(), "review_1", ExportFormat::Pdf).unwrap();
        assert!(path.ends_with("review_1.pdf"));
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn format_reads_from_config_json() {
        assert_eq!(ExportFormat::default(), ExportFormat::Docx);
        let format: ExportFormat = serde_json::from_str(r#""pdf""#).unwrap();
        assert_eq!(format.extension(), "pdf");
    }
}
