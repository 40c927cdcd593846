//! `word/document.xml` generation.

use crate::docx::drawing::inline_drawing;
use crate::docx::parts::{relationship_types, Relationships, XML_DECLARATION};
use crate::model::{Alignment, Block, Image, Inline, Paragraph, Run, Table};
use quick_xml::escape::escape;

/// An image part collected while writing the body.
#[derive(Debug)]
pub struct MediaPart<'a> {
    /// Path inside the package, e.g. `word/media/image1.jpeg`.
    pub path: String,
    pub data: &'a [u8],
}

/// A4 portrait in twips, 1 inch margins.
const SECTION_PROPERTIES: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="851" w:footer="992" w:gutter="0"/></w:sectPr>"#;

/// Writes the main document part, registering one image relationship per
/// embedded picture.
pub struct BodyWriter<'r, 'a> {
    rels: &'r mut Relationships,
    media: Vec<MediaPart<'a>>,
}

impl<'r, 'a> BodyWriter<'r, 'a> {
    pub fn new(rels: &'r mut Relationships) -> Self {
        Self {
            rels,
            media: Vec::new(),
        }
    }

    /// Render `blocks` and return the XML plus the media parts it references.
    pub fn write(mut self, blocks: &'a [Block]) -> (String, Vec<MediaPart<'a>>) {
        let mut xml = String::from(XML_DECLARATION);
        xml.push_str(concat!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#,
            r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#,
            r#" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing""#,
            r#" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main""#,
            r#" xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
        ));
        xml.push_str("<w:body>");

        for block in blocks {
            match block {
                Block::Paragraph(p) => self.write_paragraph(&mut xml, p),
                Block::Table(t) => self.write_table(&mut xml, t),
            }
        }

        xml.push_str(SECTION_PROPERTIES);
        xml.push_str("</w:body></w:document>");
        (xml, self.media)
    }

    fn write_paragraph(&mut self, xml: &mut String, p: &'a Paragraph) {
        xml.push_str("<w:p>");

        // pPr children in schema order: spacing, then jc.
        if p.spacing.is_some() || p.alignment != Alignment::Left {
            xml.push_str("<w:pPr>");
            if let Some(spacing) = p.spacing {
                xml.push_str(&format!(
                    r#"<w:spacing w:before="{}" w:after="{}"/>"#,
                    spacing.before, spacing.after
                ));
            }
            match p.alignment {
                Alignment::Left => {}
                Alignment::Center => xml.push_str(r#"<w:jc w:val="center"/>"#),
                Alignment::Right => xml.push_str(r#"<w:jc w:val="right"/>"#),
            }
            xml.push_str("</w:pPr>");
        }

        for inline in &p.children {
            match inline {
                Inline::Run(run) => write_run(xml, run),
                Inline::Image(image) => self.write_image(xml, image),
            }
        }

        xml.push_str("</w:p>");
    }

    fn write_image(&mut self, xml: &mut String, image: &'a Image) {
        let n = self.media.len() + 1;
        let target = format!("media/image{n}.jpeg");
        let rel_id = self.rels.add(relationship_types::IMAGE, &target);
        self.media.push(MediaPart {
            path: format!("word/{target}"),
            data: &image.data,
        });

        xml.push_str("<w:r>");
        xml.push_str(&inline_drawing(
            &rel_id,
            n as u32,
            image.width,
            image.height,
            &image.name,
        ));
        xml.push_str("</w:r>");
    }

    fn write_table(&mut self, xml: &mut String, table: &'a Table) {
        xml.push_str("<w:tbl>");

        // tblPr children in schema order: tblW, tblBorders, tblLayout, tblCellMar.
        xml.push_str("<w:tblPr>");
        xml.push_str(&format!(
            r#"<w:tblW w:w="{}" w:type="pct"/>"#,
            table.width_pct * 50
        ));
        xml.push_str("<w:tblBorders>");
        for edge in ["top", "left", "bottom", "right", "insideH", "insideV"] {
            xml.push_str(&format!(
                r#"<w:{edge} w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#
            ));
        }
        xml.push_str("</w:tblBorders>");
        xml.push_str(r#"<w:tblLayout w:type="fixed"/>"#);
        let m = table.cell_margins;
        xml.push_str("<w:tblCellMar>");
        xml.push_str(&format!(r#"<w:top w:w="{}" w:type="dxa"/>"#, m.top));
        xml.push_str(&format!(r#"<w:left w:w="{}" w:type="dxa"/>"#, m.left));
        xml.push_str(&format!(r#"<w:bottom w:w="{}" w:type="dxa"/>"#, m.bottom));
        xml.push_str(&format!(r#"<w:right w:w="{}" w:type="dxa"/>"#, m.right));
        xml.push_str("</w:tblCellMar>");
        xml.push_str("</w:tblPr>");

        xml.push_str("<w:tblGrid>");
        for w in &table.column_widths {
            xml.push_str(&format!(r#"<w:gridCol w:w="{w}"/>"#));
        }
        xml.push_str("</w:tblGrid>");

        for row in &table.rows {
            xml.push_str("<w:tr>");
            for (cell, width) in row.cells.iter().zip(&table.column_widths) {
                xml.push_str("<w:tc>");
                xml.push_str(&format!(
                    r#"<w:tcPr><w:tcW w:w="{width}" w:type="dxa"/></w:tcPr>"#
                ));
                if cell.children.is_empty() {
                    // A cell must end with a paragraph.
                    xml.push_str("<w:p/>");
                }
                for p in &cell.children {
                    self.write_paragraph(xml, p);
                }
                xml.push_str("</w:tc>");
            }
            xml.push_str("</w:tr>");
        }

        xml.push_str("</w:tbl>");
    }
}

fn write_run(xml: &mut String, run: &Run) {
    xml.push_str("<w:r>");
    // rPr children in schema order: b, bCs, sz, szCs.
    if run.bold || run.size.is_some() {
        xml.push_str("<w:rPr>");
        if run.bold {
            xml.push_str("<w:b/><w:bCs/>");
        }
        if let Some(size) = run.size {
            xml.push_str(&format!(r#"<w:sz w:val="{size}"/><w:szCs w:val="{size}"/>"#));
        }
        xml.push_str("</w:rPr>");
    }
    xml.push_str(r#"<w:t xml:space="preserve">"#);
    xml.push_str(&escape(run.text.as_str()));
    xml.push_str("</w:t>");
    xml.push_str("</w:r>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellMargins, Row, Spacing};

    fn render(blocks: &[Block]) -> (String, usize, Relationships) {
        let mut rels = Relationships::for_document();
        let (xml, media) = BodyWriter::new(&mut rels).write(blocks);
        let n = media.len();
        (xml, n, rels)
    }

    #[test]
    fn paragraph_properties_in_schema_order() {
        let p = Paragraph::default()
            .with_run(Run::new("标题").size(30))
            .aligned(Alignment::Center)
            .spaced(Spacing::around(100));
        let (xml, _, _) = render(&[Block::Paragraph(p)]);
        assert!(xml.contains(
            r#"<w:pPr><w:spacing w:before="100" w:after="100"/><w:jc w:val="center"/></w:pPr>"#
        ));
        assert!(xml.contains(r#"<w:rPr><w:sz w:val="30"/><w:szCs w:val="30"/></w:rPr>"#));
    }

    #[test]
    fn text_is_escaped() {
        let (xml, _, _) = render(&[Block::Paragraph(Paragraph::text("R&D <travel>"))]);
        assert!(xml.contains("R&amp;D &lt;travel&gt;"));
    }

    #[test]
    fn table_grid_and_margins() {
        let table = Table {
            column_widths: vec![1000, 2000],
            width_pct: 100,
            cell_margins: CellMargins {
                top: 20,
                bottom: 20,
                left: 100,
                right: 100,
            },
            rows: vec![Row::of_texts(["a", "b"], true)],
        };
        let (xml, _, _) = render(&[Block::Table(table)]);
        assert!(xml.contains(r#"<w:tblW w:w="5000" w:type="pct"/>"#));
        assert!(xml.contains(r#"<w:gridCol w:w="1000"/><w:gridCol w:w="2000"/>"#));
        assert!(xml.contains(r#"<w:top w:w="20" w:type="dxa"/><w:left w:w="100" w:type="dxa"/>"#));
        assert!(xml.contains("<w:b/>"));
    }

    #[test]
    fn images_get_sequential_parts_and_relationships() {
        let img = |name: &str| Image {
            data: vec![0xFF, 0xD8],
            width: 500,
            height: 375,
            name: name.into(),
        };
        let blocks = [
            Block::Paragraph(Paragraph::default().with_image(img("a"))),
            Block::Paragraph(Paragraph::default().with_image(img("b"))),
        ];
        let (xml, media, rels) = render(&blocks);
        assert_eq!(media, 2);
        assert!(xml.contains(r#"r:embed="rId3""#));
        assert!(xml.contains(r#"r:embed="rId4""#));
        assert!(xml.contains(r#"<wp:docPr id="2""#));
        let targets: Vec<_> = rels.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(
            targets,
            ["styles.xml", "settings.xml", "media/image1.jpeg", "media/image2.jpeg"]
        );
    }
}
