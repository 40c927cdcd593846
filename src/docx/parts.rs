//! Package bookkeeping parts: content types, relationships, styles,
//! settings and core properties.
//!
//! All collections are ordered so the generated XML is identical for
//! identical documents.

use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use std::collections::BTreeMap;

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Relationship type URIs used by this writer.
pub mod relationship_types {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const CORE_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
    pub const STYLES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
    pub const SETTINGS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
}

/// `[Content_Types].xml`
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    /// Extension → content type.
    defaults: BTreeMap<String, String>,
    /// Part name → content type.
    overrides: BTreeMap<String, String>,
}

impl ContentTypes {
    /// Content types of a minimal WordprocessingML package.
    pub fn for_document() -> Self {
        let mut ct = Self::default();
        ct.add_default(
            "rels",
            "application/vnd.openxmlformats-package.relationships+xml",
        );
        ct.add_default("xml", "application/xml");
        ct.add_override(
            "/word/document.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
        );
        ct.add_override(
            "/word/styles.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml",
        );
        ct.add_override(
            "/word/settings.xml",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml",
        );
        ct.add_override(
            "/docProps/core.xml",
            "application/vnd.openxmlformats-package.core-properties+xml",
        );
        ct
    }

    pub fn add_default(&mut self, extension: &str, content_type: &str) {
        self.defaults
            .insert(extension.to_string(), content_type.to_string());
    }

    pub fn add_override(&mut self, part_name: &str, content_type: &str) {
        self.overrides
            .insert(part_name.to_string(), content_type.to_string());
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(XML_DECLARATION);
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(r#"<Default Extension="{ext}" ContentType="{ct}"/>"#));
        }
        for (part, ct) in &self.overrides {
            xml.push_str(&format!(r#"<Override PartName="{part}" ContentType="{ct}"/>"#));
        }
        xml.push_str("</Types>");
        xml
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: &'static str,
    pub target: String,
}

/// A `.rels` part. Ids are handed out in insertion order: `rId1`, `rId2`, …
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    relationships: Vec<Relationship>,
}

impl Relationships {
    /// `_rels/.rels`: the main document and the core properties.
    pub fn for_package() -> Self {
        let mut rels = Self::default();
        rels.add(relationship_types::OFFICE_DOCUMENT, "word/document.xml");
        rels.add(relationship_types::CORE_PROPERTIES, "docProps/core.xml");
        rels
    }

    /// `word/_rels/document.xml.rels` before any media is added.
    pub fn for_document() -> Self {
        let mut rels = Self::default();
        rels.add(relationship_types::STYLES, "styles.xml");
        rels.add(relationship_types::SETTINGS, "settings.xml");
        rels
    }

    /// Add a relationship and return its id.
    pub fn add(&mut self, rel_type: &'static str, target: &str) -> String {
        let id = format!("rId{}", self.relationships.len() + 1);
        self.relationships.push(Relationship {
            id: id.clone(),
            rel_type,
            target: target.to_string(),
        });
        id
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(XML_DECLARATION);
        xml.push_str(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for rel in &self.relationships {
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
                rel.id,
                rel.rel_type,
                escape(rel.target.as_str())
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }
}

/// `word/styles.xml`: document defaults only. East-Asian text falls back to
/// SimSun so the Chinese labels render on systems without the theme fonts.
pub fn styles_xml() -> String {
    format!(
        r#"{XML_DECLARATION}<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:eastAsia="SimSun" w:cs="Times New Roman"/><w:sz w:val="21"/><w:szCs w:val="21"/><w:lang w:val="en-US" w:eastAsia="zh-CN"/></w:rPr></w:rPrDefault><w:pPrDefault/></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style><w:style w:type="table" w:default="1" w:styleId="TableNormal"><w:name w:val="Normal Table"/><w:tblPr><w:tblInd w:w="0" w:type="dxa"/><w:tblCellMar><w:top w:w="0" w:type="dxa"/><w:left w:w="108" w:type="dxa"/><w:bottom w:w="0" w:type="dxa"/><w:right w:w="108" w:type="dxa"/></w:tblCellMar></w:tblPr></w:style></w:styles>"#
    )
}

/// `word/settings.xml`
pub fn settings_xml() -> String {
    format!(
        r#"{XML_DECLARATION}<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:defaultTabStop w:val="420"/><w:compat><w:compatSetting w:name="compatibilityMode" w:uri="http://schemas.microsoft.com/office/word" w:val="15"/></w:compat></w:settings>"#
    )
}

/// `docProps/core.xml`. Timestamps are omitted when `created` is `None`.
pub fn core_xml(title: &str, created: Option<DateTime<Utc>>) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#);
    xml.push_str(&format!("<dc:title>{}</dc:title>", escape(title)));
    if let Some(at) = created {
        let stamp = at.format("%Y-%m-%dT%H:%M:%SZ");
        xml.push_str(&format!(
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{stamp}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{stamp}</dcterms:modified>"#
        ));
    }
    xml.push_str("</cp:coreProperties>");
    xml
}
