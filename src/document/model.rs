//! Structured document tree.
//!
//! Builders produce a `Document`; renderers consume it. The tree carries no
//! layout decisions beyond block order.

use serde::{Deserialize, Serialize};

use super::DocumentError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub subtitle: Option<String>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading { text: String },
    Paragraph { text: String },
    /// Label/value pairs rendered as an aligned header section.
    Fields { entries: Vec<(String, String)> },
    Table(Table),
    Signatures { lines: Vec<SignatureLine> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub caption: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Relative column widths; equal widths when empty.
    pub widths: Vec<f32>,
}

/// A fixed signature slot: role printed under a blank line, with a date field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureLine {
    pub role: String,
    pub name: Option<String>,
}

impl SignatureLine {
    pub fn role(role: &str) -> Self {
        Self { role: role.into(), name: None }
    }
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            caption: None,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            widths: Vec::new(),
        }
    }

    pub fn with_caption(mut self, caption: &str) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_widths(mut self, widths: &[f32]) -> Self {
        self.widths = widths.to_vec();
        self
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Column fractions summing to 1.
    pub fn column_fractions(&self) -> Vec<f32> {
        let n = self.headers.len().max(1);
        if self.widths.len() != self.headers.len() || self.widths.iter().any(|w| *w <= 0.0) {
            return vec![1.0 / n as f32; n];
        }
        let total: f32 = self.widths.iter().sum();
        self.widths.iter().map(|w| w / total).collect()
    }

    fn validate(&self) -> Result<(), DocumentError> {
        if self.headers.is_empty() {
            return Err(DocumentError::Assembly("table without columns".into()));
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.headers.len() {
                return Err(DocumentError::Assembly(format!(
                    "table row {} has {} cells, expected {}",
                    i + 1,
                    row.len(),
                    self.headers.len()
                )));
            }
        }
        Ok(())
    }
}

impl Document {
    pub fn new(title: &str) -> Self {
        Self { title: title.into(), subtitle: None, blocks: Vec::new() }
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn heading(&mut self, text: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Heading { text: text.into() });
        self
    }

    pub fn paragraph(&mut self, text: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Paragraph { text: text.into() });
        self
    }

    pub fn fields(&mut self, entries: Vec<(String, String)>) -> &mut Self {
        self.blocks.push(Block::Fields { entries });
        self
    }

    pub fn table(&mut self, table: Table) -> &mut Self {
        self.blocks.push(Block::Table(table));
        self
    }

    pub fn signatures(&mut self, lines: Vec<SignatureLine>) -> &mut Self {
        self.blocks.push(Block::Signatures { lines });
        self
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            _ => None,
        })
    }

    /// Structural checks run before rendering.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.title.trim().is_empty() {
            return Err(DocumentError::Assembly("document without title".into()));
        }
        for table in self.tables() {
            table.validate()?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
