//! Word-processing (`.docx`) rendering of document trees via `docx-rs`.

use std::io::Cursor;

use docx_rs::{AlignmentType, Docx, Paragraph, Run, Table as DocxTable, TableCell, TableRow, WidthType};

use super::model::{Block, Document, SignatureLine, Table};
use super::DocumentError;

/// Usable line width of an A4 page with default margins, in twentieths of a point.
const CONTENT_WIDTH_TWIPS: f32 = 9000.0;

// Run sizes are in half-points
const TITLE_SIZE: usize = 28;
const SUBTITLE_SIZE: usize = 20;
const HEADING_SIZE: usize = 22;
const BODY_SIZE: usize = 19;
const TABLE_SIZE: usize = 17;

fn text_run(text: &str, size: usize) -> Run {
    Run::new().add_text(text).size(size)
}

fn cell(text: &str, width: usize, bold: bool) -> TableCell {
    let run = if bold { text_run(text, TABLE_SIZE).bold() } else { text_run(text, TABLE_SIZE) };
    TableCell::new()
        .width(width, WidthType::Dxa)
        .add_paragraph(Paragraph::new().add_run(run))
}

/// Column widths in twips.
fn grid(t: &Table) -> Vec<usize> {
    t.column_fractions()
        .iter()
        .map(|f| (f * CONTENT_WIDTH_TWIPS) as usize)
        .collect()
}

fn table(t: &Table) -> DocxTable {
    let widths = grid(t);

    let mut rows = Vec::with_capacity(t.rows.len() + 1);
    rows.push(TableRow::new(
        t.headers.iter().zip(&widths).map(|(h, w)| cell(h, *w, true)).collect(),
    ));
    for row in &t.rows {
        rows.push(TableRow::new(
            row.iter().zip(&widths).map(|(c, w)| cell(c, *w, false)).collect(),
        ));
    }
    DocxTable::new(rows).set_grid(widths)
}

fn fields(entries: &[(String, String)]) -> DocxTable {
    let label_width = (CONTENT_WIDTH_TWIPS * 0.3) as usize;
    let value_width = (CONTENT_WIDTH_TWIPS * 0.7) as usize;
    let rows = entries
        .iter()
        .map(|(label, value)| TableRow::new(vec![cell(label, label_width, true), cell(value, value_width, false)]))
        .collect();
    DocxTable::new(rows).set_grid(vec![label_width, value_width])
}

fn signature(docx: Docx, sig: &SignatureLine) -> Docx {
    let caption = match &sig.name {
        Some(name) => format!("{name}, {}", sig.role),
        None => sig.role.clone(),
    };
    docx.add_paragraph(Paragraph::new())
        .add_paragraph(
            Paragraph::new()
                .add_run(text_run("________________________________", BODY_SIZE))
                .add_run(Run::new().add_tab())
                .add_run(text_run("Date: ______________", BODY_SIZE)),
        )
        .add_paragraph(Paragraph::new().add_run(text_run(&caption, TABLE_SIZE)))
}

/// Renders a document tree to `.docx` package bytes.
pub fn generate_docx(document: &Document) -> Result<Vec<u8>, DocumentError> {
    document.validate()?;

    let mut docx = Docx::new().add_paragraph(
        Paragraph::new()
            .align(AlignmentType::Center)
            .add_run(text_run(&document.title, TITLE_SIZE).bold()),
    );
    if let Some(subtitle) = &document.subtitle {
        docx = docx.add_paragraph(
            Paragraph::new()
                .align(AlignmentType::Center)
                .add_run(text_run(subtitle, SUBTITLE_SIZE)),
        );
    }

    for block in &document.blocks {
        docx = match block {
            Block::Heading { text } => {
                docx.add_paragraph(Paragraph::new().add_run(text_run(&text.to_uppercase(), HEADING_SIZE).bold()))
            }
            Block::Paragraph { text } => docx.add_paragraph(Paragraph::new().add_run(text_run(text, BODY_SIZE))),
            Block::Fields { entries } => docx.add_table(fields(entries)).add_paragraph(Paragraph::new()),
            Block::Table(t) => {
                let docx = match &t.caption {
                    Some(caption) => docx.add_paragraph(Paragraph::new().add_run(text_run(caption, BODY_SIZE).bold())),
                    None => docx,
                };
                docx.add_table(table(t)).add_paragraph(Paragraph::new())
            }
            Block::Signatures { lines } => lines.iter().fold(docx, signature),
        };
    }

    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|e| DocumentError::Render(format!("DOCX package error: {e}")))?;
    tracing::debug!(title = %document.title, blocks = document.blocks.len(), "Rendered document");
    Ok(buf.into_inner())
}
