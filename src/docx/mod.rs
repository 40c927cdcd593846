//! DOCX (WordprocessingML) serialisation of a [`Document`].
//!
//! ## Package layout
//!
//! ```text
//! [Content_Types].xml
//! _rels/.rels
//! docProps/core.xml
//! word/document.xml
//! word/styles.xml
//! word/settings.xml
//! word/_rels/document.xml.rels
//! word/media/image1.jpeg …
//! ```
//!
//! ## Why is the output reproducible?
//!
//! Entries are written in a fixed order with a fixed modification time, and
//! every collection feeding the XML is ordered. Serialising the same model
//! twice yields the same bytes, which lets callers diff or hash reports.
//! The only run-dependent content is the optional `created` timestamp.

pub mod body;
pub mod drawing;
pub mod parts;

use crate::error::CompileError;
use crate::model::{Block, Document, DocumentSerializer, Inline, Paragraph};
use body::BodyWriter;
use parts::{ContentTypes, Relationships};
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Serialises a [`Document`] into a `.docx` container.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxSerializer;

impl DocumentSerializer for DocxSerializer {
    fn extension(&self) -> &'static str {
        "docx"
    }

    fn serialize(&self, document: &Document) -> Result<Vec<u8>, CompileError> {
        validate(document)?;

        let mut doc_rels = Relationships::for_document();
        let (document_xml, media) = BodyWriter::new(&mut doc_rels).write(&document.blocks);

        let mut content_types = ContentTypes::for_document();
        if !media.is_empty() {
            content_types.add_default("jpeg", "image/jpeg");
        }

        let mut package = PackageWriter::new();
        package.write_file("[Content_Types].xml", &content_types.to_xml())?;
        package.write_file("_rels/.rels", &Relationships::for_package().to_xml())?;
        package.write_file(
            "docProps/core.xml",
            &parts::core_xml(&document.title, document.created),
        )?;
        package.write_file("word/document.xml", &document_xml)?;
        package.write_file("word/styles.xml", &parts::styles_xml())?;
        package.write_file("word/settings.xml", &parts::settings_xml())?;
        package.write_file("word/_rels/document.xml.rels", &doc_rels.to_xml())?;
        for part in &media {
            package.write_binary(&part.path, part.data)?;
        }

        let bytes = package.finish()?;
        debug!(
            "Serialised DOCX: {} blocks, {} images, {} bytes",
            document.blocks.len(),
            media.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

/// ZIP writer with fixed entry timestamps.
struct PackageWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl PackageWriter {
    fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    fn options(method: CompressionMethod) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(method)
            .last_modified_time(zip::DateTime::default())
    }

    fn write_file(&mut self, path: &str, content: &str) -> Result<(), CompileError> {
        self.zip
            .start_file(path, Self::options(CompressionMethod::Deflated))?;
        self.zip.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Media is already compressed; store it as-is.
    fn write_binary(&mut self, path: &str, data: &[u8]) -> Result<(), CompileError> {
        self.zip
            .start_file(path, Self::options(CompressionMethod::Stored))?;
        self.zip.write_all(data)?;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, CompileError> {
        Ok(self.zip.finish()?.into_inner())
    }
}

/// Reject models WordprocessingML cannot express faithfully.
fn validate(document: &Document) -> Result<(), CompileError> {
    for (b, block) in document.blocks.iter().enumerate() {
        match block {
            Block::Paragraph(p) => validate_paragraph(p)?,
            Block::Table(table) => {
                if table.column_widths.is_empty() {
                    return Err(CompileError::InvalidModel(format!(
                        "table in block {b} has no columns"
                    )));
                }
                for (r, row) in table.rows.iter().enumerate() {
                    if row.cells.len() != table.column_widths.len() {
                        return Err(CompileError::InvalidModel(format!(
                            "row {r} of table in block {b} has {} cells, grid has {} columns",
                            row.cells.len(),
                            table.column_widths.len()
                        )));
                    }
                    for p in row.cells.iter().flat_map(|c| &c.children) {
                        validate_paragraph(p)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn validate_paragraph(p: &Paragraph) -> Result<(), CompileError> {
    for inline in &p.children {
        if let Inline::Image(image) = inline {
            if image.width == 0 || image.height == 0 {
                return Err(CompileError::InvalidModel(format!(
                    "image '{}' has zero size {}x{}",
                    image.name, image.width, image.height
                )));
            }
            if image.data.is_empty() {
                return Err(CompileError::InvalidModel(format!(
                    "image '{}' has no data",
                    image.name
                )));
            }
        }
    }
    Ok(())
}
