//! Report input types: the line items handed over by the form layer.
//!
//! Every field of a [`LineItem`] is optional because any cell of the entry
//! form may be left blank. The calculation layer turns blanks into neutral
//! defaults (0 days, 0 amount) rather than errors; see [`crate::calc`].

use serde::{Deserialize, Serialize};

/// A pair of date strings, `[start, end]`.
///
/// Serialised as a two-element JSON array. Missing or empty elements
/// deserialise to `None`, which the calculator treats as "no range".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Option<String>>", into = "Vec<Option<String>>")]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    /// Both ends, if both are present.
    pub fn bounds(&self) -> Option<(&str, &str)> {
        match (self.start.as_deref(), self.end.as_deref()) {
            (Some(s), Some(e)) => Some((s, e)),
            _ => None,
        }
    }
}

impl From<Vec<Option<String>>> for DateRange {
    fn from(parts: Vec<Option<String>>) -> Self {
        let mut parts = parts
            .into_iter()
            .map(|p| p.filter(|s| !s.trim().is_empty()));
        Self {
            start: parts.next().flatten(),
            end: parts.next().flatten(),
        }
    }
}

impl From<DateRange> for Vec<Option<String>> {
    fn from(range: DateRange) -> Self {
        vec![range.start, range.end]
    }
}

/// How an invoice source must be rasterised, chosen from its media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A still image (`image/*`).
    Raster,
    /// A paginated document (`application/pdf`); only page 1 is used.
    Paginated,
}

impl SourceKind {
    /// Classify a declared media type. Unknown types yield `None` and the
    /// invoice is skipped.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let mt = media_type.trim().to_ascii_lowercase();
        if mt.starts_with("image/") {
            Some(SourceKind::Raster)
        } else if mt == "application/pdf" {
            Some(SourceKind::Paginated)
        } else {
            None
        }
    }
}

/// Raw bytes of a scanned invoice plus the media type it was declared with.
#[derive(Clone, PartialEq, Eq)]
pub struct InvoiceSource {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl InvoiceSource {
    pub fn new(media_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn kind(&self) -> Option<SourceKind> {
        SourceKind::from_media_type(&self.media_type)
    }
}

impl std::fmt::Debug for InvoiceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceSource")
            .field("media_type", &self.media_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// One expense or subsidy record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    /// Category label ("train ticket", "hotel", "travel subsidy", ...).
    pub category: Option<String>,
    /// Single occurrence date, shown verbatim for project items.
    pub date: Option<String>,
    /// Date range; drives the day count of subsidy items.
    pub date_range: Option<DateRange>,
    pub amount: Option<f64>,
    /// Responsible party.
    pub handler: Option<String>,
    pub remark: Option<String>,
    /// Attached invoice, not yet normalised. Resolved by [`crate::manifest`]
    /// when loading from JSON.
    #[serde(skip)]
    pub invoice: Option<InvoiceSource>,
}

impl LineItem {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.date_range = Some(DateRange::new(start, end));
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    pub fn with_invoice(mut self, invoice: InvoiceSource) -> Self {
        self.invoice = Some(invoice);
        self
    }
}

/// Everything needed for one export call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpenseReport {
    /// Output file name without extension.
    pub file_name: Option<String>,
    /// Trip location. Kept for the form layer; not rendered.
    pub location: Option<String>,
    pub travelers: Vec<String>,
    pub date_range: Option<DateRange>,
    /// Project expense items, in display order.
    pub items: Vec<LineItem>,
    /// Daily-subsidy items, in display order.
    pub subsidies: Vec<LineItem>,
}

/// Used when the report carries no file name.
pub const DEFAULT_FILE_NAME: &str = "expense-report";

impl ExpenseReport {
    /// `<file_name>.<extension>`, with path separators replaced so the
    /// result always names a single file.
    pub fn output_file_name(&self, extension: &str) -> String {
        let stem = self
            .file_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME);
        let stem: String = stem
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '\0' => '_',
                c => c,
            })
            .collect();
        format!("{stem}.{extension}")
    }
}
