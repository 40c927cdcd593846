//! JSON manifests: the on-disk form of an [`ExpenseReport`].
//!
//! ```json
//! {
//!   "file_name": "2024-01 Shanghai",
//!   "travelers": ["张三", "李四"],
//!   "date_range": ["2024-01-01", "2024-01-03"],
//!   "items": [
//!     { "category": "火车票", "date": "2024-01-01", "amount": 553,
//!       "remark": "高铁", "invoice": { "path": "invoices/train.pdf" } },
//!     { "category": "酒店", "amount": 800,
//!       "invoice": { "data": "data:image/jpeg;base64,/9j/4AAQ..." } }
//!   ],
//!   "subsidies": [
//!     { "category": "出差补贴", "date_range": ["2024-01-01", "2024-01-03"], "amount": 150 }
//!   ]
//! }
//! ```
//!
//! Invoice paths are resolved relative to the manifest's directory. All
//! invoice bytes are read while loading, so a missing file fails fast
//! instead of silently dropping a picture from the report.

use crate::error::ReportError;
use crate::report::{DateRange, ExpenseReport, InvoiceSource, LineItem};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

static DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:(?P<mime>[^;,]*)(?:;[^;,]*)*?;base64,(?P<data>.*)$")
        .expect("valid regex")
});

/// Deserialised manifest, before invoice references are resolved.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub file_name: Option<String>,
    pub location: Option<String>,
    pub travelers: Vec<String>,
    pub date_range: Option<DateRange>,
    pub items: Vec<ManifestItem>,
    pub subsidies: Vec<ManifestItem>,
}

/// A line item plus an optional reference to its invoice.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestItem {
    #[serde(flatten)]
    pub item: LineItem,
    #[serde(default)]
    pub invoice: Option<InvoiceRef>,
}

/// Where an invoice's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum InvoiceRef {
    /// A file; the media type is guessed from the extension when omitted.
    File {
        path: PathBuf,
        #[serde(default)]
        media_type: Option<String>,
    },
    /// An inline `data:<mime>;base64,<payload>` URI.
    DataUri { data: String },
}

impl Manifest {
    /// Read and resolve a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<ExpenseReport, ReportError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ReportError::ManifestNotFound {
                path: path.to_path_buf(),
            },
            _ => ReportError::ManifestInvalid {
                path: path.to_path_buf(),
                detail: e.to_string(),
            },
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let report = Self::from_json_str(&text, base_dir).map_err(|e| match e {
            ReportError::ManifestInvalid { detail, .. } => ReportError::ManifestInvalid {
                path: path.to_path_buf(),
                detail,
            },
            other => other,
        })?;

        info!(
            "Loaded manifest {}: {} items, {} subsidies",
            path.display(),
            report.items.len(),
            report.subsidies.len()
        );
        Ok(report)
    }

    /// Parse manifest JSON, resolving relative invoice paths against
    /// `base_dir`.
    pub fn from_json_str(json: &str, base_dir: &Path) -> Result<ExpenseReport, ReportError> {
        let manifest: Manifest =
            serde_json::from_str(json).map_err(|e| ReportError::ManifestInvalid {
                path: PathBuf::from("<inline>"),
                detail: e.to_string(),
            })?;
        manifest.resolve(base_dir)
    }

    /// Read every referenced invoice and build the report.
    pub fn resolve(self, base_dir: &Path) -> Result<ExpenseReport, ReportError> {
        let items = self
            .items
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                let mut item = entry.item;
                item.invoice = match entry.invoice {
                    Some(reference) => Some(load_invoice(idx + 1, &reference, base_dir)?),
                    None => None,
                };
                Ok(item)
            })
            .collect::<Result<Vec<LineItem>, ReportError>>()?;

        let subsidies = self
            .subsidies
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                if entry.invoice.is_some() {
                    warn!("Subsidy {}: invoices are only shown for project items, ignoring", idx + 1);
                }
                entry.item
            })
            .collect();

        Ok(ExpenseReport {
            file_name: self.file_name,
            location: self.location,
            travelers: self.travelers,
            date_range: self.date_range,
            items,
            subsidies,
        })
    }
}

fn load_invoice(item: usize, reference: &InvoiceRef, base_dir: &Path) -> Result<InvoiceSource, ReportError> {
    match reference {
        InvoiceRef::File { path, media_type } => {
            let full = if path.is_absolute() {
                path.clone()
            } else {
                base_dir.join(path)
            };
            let bytes = std::fs::read(&full).map_err(|source| ReportError::InvoiceReadFailed {
                item,
                path: full.clone(),
                source,
            })?;
            let media_type = media_type
                .clone()
                .unwrap_or_else(|| media_type_for_path(&full).to_string());
            debug!(
                "Item {}: invoice {} ({}, {} bytes)",
                item,
                full.display(),
                media_type,
                bytes.len()
            );
            Ok(InvoiceSource::new(media_type, bytes))
        }
        InvoiceRef::DataUri { data } => parse_data_uri(data).ok_or_else(|| {
            ReportError::ManifestInvalid {
                path: PathBuf::from("<inline>"),
                detail: format!("item {item}: invoice is not a base64 data URI"),
            }
        }),
    }
}

/// Decode `data:<mime>;base64,<payload>`. An empty media type means
/// `text/plain`, which is then skipped at export time.
pub fn parse_data_uri(uri: &str) -> Option<InvoiceSource> {
    let caps = DATA_URI.captures(uri.trim())?;
    let mime = caps.name("mime").map_or("", |m| m.as_str());
    let payload: String = caps
        .name("data")?
        .as_str()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD.decode(payload).ok()?;
    let media_type = if mime.is_empty() { "text/plain" } else { mime };
    Some(InvoiceSource::new(media_type, bytes))
}

/// Media type guessed from a file extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
