//! Format-neutral document model.
//!
//! A report is a flat list of [`Block`]s. The model knows nothing about any
//! container format; a [`DocumentSerializer`] turns it into bytes. Units:
//! font sizes are half-points, spacing/widths/margins are twips (1/20 pt),
//! image sizes are display pixels (96 per inch).

use crate::error::CompileError;
use chrono::{DateTime, Utc};

/// A compiled report, ready for serialisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Title stored in the document properties.
    pub title: String,
    /// Creation timestamp for the document properties; `None` keeps output
    /// reproducible.
    pub created: Option<DateTime<Utc>>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Space above and below a paragraph, in twips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Spacing {
    pub before: u32,
    pub after: u32,
}

impl Spacing {
    pub fn around(twips: u32) -> Self {
        Self {
            before: twips,
            after: twips,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paragraph {
    pub alignment: Alignment,
    pub spacing: Option<Spacing>,
    pub children: Vec<Inline>,
}

impl Paragraph {
    /// A paragraph with no content; renders as an empty line.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A paragraph holding a single plain run.
    pub fn text(text: impl Into<String>) -> Self {
        Self::default().with_run(Run::new(text))
    }

    pub fn with_run(mut self, run: Run) -> Self {
        self.children.push(Inline::Run(run));
        self
    }

    pub fn with_image(mut self, image: Image) -> Self {
        self.children.push(Inline::Image(image));
        self
    }

    pub fn aligned(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn spaced(mut self, spacing: Spacing) -> Self {
        self.spacing = Some(spacing);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Run(Run),
    Image(Image),
}

/// A span of uniformly formatted text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    /// Font size in half-points; `None` inherits the document default.
    pub size: Option<u32>,
}

impl Run {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn size(mut self, half_points: u32) -> Self {
        self.size = Some(half_points);
        self
    }
}

/// An inline JPEG picture.
#[derive(Clone, PartialEq)]
pub struct Image {
    /// Encoded JPEG bytes.
    pub data: Vec<u8>,
    /// Display width in pixels.
    pub width: u32,
    /// Display height in pixels.
    pub height: u32,
    /// Name shown to assistive technology.
    pub name: String,
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .field("width", &self.width)
            .field("height", &self.height)
            .field("name", &self.name)
            .finish()
    }
}

/// Inner padding of every table cell, in twips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellMargins {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Grid column widths in twips. Every row must have exactly this many
    /// cells.
    pub column_widths: Vec<u32>,
    /// Preferred table width as a percentage of the text area.
    pub width_pct: u32,
    pub cell_margins: CellMargins,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    /// One single-paragraph cell per text, all sharing `bold`.
    pub fn of_texts<I, S>(texts: I, bold: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: texts.into_iter().map(|t| Cell::text(t, bold)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub children: Vec<Paragraph>,
}

impl Cell {
    pub fn of(paragraph: Paragraph) -> Self {
        Self {
            children: vec![paragraph],
        }
    }

    /// A cell holding one run of text.
    pub fn text(text: impl Into<String>, bold: bool) -> Self {
        let run = Run::new(text);
        Self::of(Paragraph::default().with_run(if bold { run.bold() } else { run }))
    }
}

/// Turns a [`Document`] into the bytes of one container format.
pub trait DocumentSerializer: Send + Sync {
    /// File extension of the produced container, without the dot.
    fn extension(&self) -> &'static str;

    /// Serialise the whole document. Identical models must produce
    /// identical bytes.
    fn serialize(&self, document: &Document) -> Result<Vec<u8>, CompileError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_of_texts_builds_one_cell_per_text() {
        let row = Row::of_texts(["a", "b", ""], true);
        assert_eq!(row.cells.len(), 3);
        let Inline::Run(run) = &row.cells[1].children[0].children[0] else {
            panic!("expected a run");
        };
        assert_eq!(run.text, "b");
        assert!(run.bold);
    }

    #[test]
    fn paragraph_builders() {
        let p = Paragraph::text("hi")
            .aligned(Alignment::Center)
            .spaced(Spacing::around(100));
        assert_eq!(p.alignment, Alignment::Center);
        assert_eq!(p.spacing, Some(Spacing { before: 100, after: 100 }));
        assert_eq!(p.children, vec![Inline::Run(Run::new("hi"))]);
    }

    #[test]
    fn image_debug_omits_bytes() {
        let img = Image {
            data: vec![0; 2048],
            width: 500,
            height: 375,
            name: "invoice".into(),
        };
        let dbg = format!("{img:?}");
        assert!(dbg.contains("<2048 bytes>"));
    }
}
