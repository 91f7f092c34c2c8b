//! PDF rendering of document trees via `printpdf`.

use std::io::BufWriter;

use printpdf::*;

use super::model::{Block, Document, SignatureLine, Table};
use super::DocumentError;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 20.0;
const MARGIN_TOP: f32 = 280.0;
const MARGIN_BOTTOM: f32 = 20.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN_LEFT;

/// Approximate Helvetica glyph width per point of font size, in mm.
const CHAR_WIDTH_PER_PT: f32 = 0.19;

fn font_error(e: impl std::fmt::Display) -> DocumentError {
    DocumentError::Render(format!("PDF font error: {e}"))
}

/// Cursor over the current page; starts a new page when space runs out.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    y: Mm,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, DocumentError> {
        let (doc, page1, layer1) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page1).get_layer(layer1);
        let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(font_error)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(font_error)?;
        Ok(Self { doc, layer, font, bold, y: Mm(MARGIN_TOP), pages: 1 })
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y.0 - needed >= MARGIN_BOTTOM {
            return;
        }
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = Mm(MARGIN_TOP);
        self.pages += 1;
    }

    fn text(&mut self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.font };
        self.layer.use_text(text, size, Mm(x), self.y, font);
    }

    fn wrapped(&mut self, text: &str, size: f32, indent: f32, line_height: f32) {
        let max_chars = chars_for_width(CONTENT_WIDTH - indent, size);
        for line in wrap_text(text, max_chars) {
            self.ensure_space(line_height);
            self.text(&line, size, MARGIN_LEFT + indent, false);
            self.y -= Mm(line_height);
        }
    }

    fn heading(&mut self, text: &str) {
        self.ensure_space(12.0);
        self.y -= Mm(3.0);
        self.text(&text.to_uppercase(), 11.0, MARGIN_LEFT, true);
        self.y -= Mm(6.0);
    }

    fn fields(&mut self, entries: &[(String, String)]) {
        for (label, value) in entries {
            self.ensure_space(5.0);
            self.text(&format!("{label}:"), 9.0, MARGIN_LEFT, true);
            self.text(value, 9.0, MARGIN_LEFT + 38.0, false);
            self.y -= Mm(4.5);
        }
        self.y -= Mm(3.0);
    }

    fn table(&mut self, table: &Table) {
        const SIZE: f32 = 8.5;
        const LINE: f32 = 4.0;

        if let Some(caption) = &table.caption {
            self.ensure_space(6.0);
            self.text(caption, 9.0, MARGIN_LEFT, true);
            self.y -= Mm(5.0);
        }

        let widths: Vec<f32> = table.column_fractions().iter().map(|f| f * CONTENT_WIDTH).collect();
        let header: Vec<Vec<String>> = table
            .headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| wrap_text(h, chars_for_width(*w - 2.0, SIZE)))
            .collect();
        self.table_row(&header, &widths, SIZE, LINE, true);

        for row in &table.rows {
            let cells: Vec<Vec<String>> = row
                .iter()
                .zip(&widths)
                .map(|(c, w)| wrap_text(c, chars_for_width(*w - 2.0, SIZE)))
                .collect();
            self.table_row(&cells, &widths, SIZE, LINE, false);
        }
        self.y -= Mm(4.0);
    }

    fn table_row(&mut self, cells: &[Vec<String>], widths: &[f32], size: f32, line: f32, bold: bool) {
        let height = cells.iter().map(Vec::len).max().unwrap_or(1) as f32 * line;
        self.ensure_space(height + 1.5);
        let top = self.y;
        let mut x = MARGIN_LEFT;
        for (lines, width) in cells.iter().zip(widths) {
            self.y = top;
            for l in lines {
                self.text(l, size, x, bold);
                self.y -= Mm(line);
            }
            x += width;
        }
        self.y = top - Mm(height + 1.5);
    }

    fn signatures(&mut self, lines: &[SignatureLine]) {
        for sig in lines {
            self.ensure_space(18.0);
            self.y -= Mm(8.0);
            self.text("________________________________", 9.0, MARGIN_LEFT, false);
            self.text("Date: ______________", 9.0, MARGIN_LEFT + 100.0, false);
            self.y -= Mm(4.5);
            let caption = match &sig.name {
                Some(name) => format!("{name}, {}", sig.role),
                None => sig.role.clone(),
            };
            self.text(&caption, 8.5, MARGIN_LEFT, false);
            self.y -= Mm(2.0);
        }
    }

    fn finish(self) -> Result<Vec<u8>, DocumentError> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| DocumentError::Render(format!("PDF save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| DocumentError::Render(format!("PDF buffer error: {e}")))
    }
}

fn chars_for_width(width_mm: f32, font_size: f32) -> usize {
    ((width_mm / (font_size * CHAR_WIDTH_PER_PT)) as usize).max(4)
}

/// Renders a document tree to PDF bytes.
pub fn generate_document(document: &Document) -> Result<Vec<u8>, DocumentError> {
    document.validate()?;

    let mut w = PageWriter::new(&document.title)?;
    w.text(&document.title, 14.0, MARGIN_LEFT, true);
    w.y -= Mm(6.0);
    if let Some(subtitle) = &document.subtitle {
        w.text(subtitle, 10.0, MARGIN_LEFT, false);
        w.y -= Mm(8.0);
    }

    for block in &document.blocks {
        match block {
            Block::Heading { text } => w.heading(text),
            Block::Paragraph { text } => {
                w.wrapped(text, 9.5, 0.0, 4.5);
                w.y -= Mm(2.0);
            }
            Block::Fields { entries } => w.fields(entries),
            Block::Table(table) => w.table(table),
            Block::Signatures { lines } => w.signatures(lines),
        }
    }

    tracing::debug!(title = %document.title, pages = w.pages, "Rendered document");
    w.finish()
}

/// Simple word-wrap helper for PDF text rendering.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.chars().count() + word.chars().count() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut doc = Document::new("Treatment Plan Review").subtitle("Dana Levi, review #1");
        doc.fields(vec![("Patient".into(), "Dana Levi".into())]);
        let mut table = Table::new(&["Goal", "Objective", "Progress"]);
        table.push_row(vec!["1".into(), "Attend all scheduled sessions".into(), "No Progress".into()]);
        doc.heading("Objectives").table(table);
        doc.signatures(vec![SignatureLine::role("Psychiatrist")]);
        doc
    }

    #[test]
    fn renders_pdf_bytes() {
        let bytes = generate_document(&sample()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_documents_paginate() {
        let mut doc = sample();
        let mut table = Table::new(&["#", "Text"]);
        for i in 0..120 {
            table.push_row(vec![i.to_string(), "A fairly long cell that will wrap across lines".into()]);
        }
        doc.table(table);
        let bytes = generate_document(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn invalid_tree_is_not_rendered() {
        let mut doc = sample();
        let mut table = Table::new(&["A", "B"]);
        table.push_row(vec!["only one".into()]);
        doc.table(table);
        assert!(matches!(generate_document(&doc), Err(DocumentError::Assembly(_))));
    }

    #[test]
    fn wrap_text_respects_width() {
        let lines = wrap_text("one two three four five six", 10);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
        assert_eq!(lines.join(" "), "one two three four five six");
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }
}
