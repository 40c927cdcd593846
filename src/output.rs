//! Result types returned by the export entry points.

use crate::error::InvoiceError;
use serde::Serialize;
use std::path::PathBuf;

/// A compiled report.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// `<file_name>.docx`
    pub file_name: String,
    /// The finished container.
    pub bytes: Vec<u8>,
    /// Invoices that could not be embedded, ordered by item.
    pub invoice_errors: Vec<InvoiceError>,
    pub stats: ExportStats,
    /// Where the sink stored the bytes; `None` until saved.
    pub saved_to: Option<PathBuf>,
}

/// Counters and timings for one export.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportStats {
    pub project_items: usize,
    /// Subsidy rows that made it into the table.
    pub included_subsidies: usize,
    /// Subsidy rows dropped for a missing range or amount.
    pub excluded_subsidies: usize,
    /// Project items carrying an invoice source.
    pub invoices: usize,
    pub embedded_invoices: usize,
    pub failed_invoices: usize,
    /// Invoices with a media type that is neither an image nor a PDF.
    pub skipped_invoices: usize,
    /// Grand total as rendered in the table.
    pub total: String,
    pub document_bytes: usize,
    pub normalize_duration_ms: u64,
    pub compile_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Computed figures of a report, without decoding or compiling anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub file_name: String,
    pub travelers: Vec<String>,
    pub project_items: usize,
    pub invoices: usize,
    pub subsidies: Vec<SubsidyLine>,
    pub total: String,
}

/// One subsidy item as the calculator sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsidyLine {
    pub category: Option<String>,
    pub days: u32,
    /// `days × daily_rate`.
    pub computed_amount: f64,
    /// Amount entered on the item; this is what the total uses.
    pub amount: Option<f64>,
    pub remark: Option<String>,
    pub included: bool,
}
