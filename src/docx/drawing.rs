//! Inline picture markup (`w:drawing` / `wp:inline`).

use quick_xml::escape::escape;

/// English Metric Units per CSS pixel (914400 EMU per inch, 96 px per inch).
pub const EMU_PER_PIXEL: i64 = 9525;

pub fn pixels_to_emu(px: u32) -> i64 {
    i64::from(px) * EMU_PER_PIXEL
}

/// A `w:drawing` element showing the image behind relationship `rel_id`.
///
/// `doc_pr_id` must be unique within the document.
pub fn inline_drawing(rel_id: &str, doc_pr_id: u32, width_px: u32, height_px: u32, name: &str) -> String {
    let (cx, cy) = (pixels_to_emu(width_px), pixels_to_emu(height_px));
    let name = escape(name);
    format!(
        concat!(
            r#"<w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:effectExtent l="0" t="0" r="0" b="0"/>"#,
            r#"<wp:docPr id="{id}" name="{name}" descr="{name}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#,
        ),
        cx = cx,
        cy = cy,
        id = doc_pr_id,
        name = name,
        rel = rel_id,
    )
}
