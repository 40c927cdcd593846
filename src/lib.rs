//! # trip-expense-report
//!
//! Compile trip-expense line items and their scanned invoices into a single
//! DOCX report.
//!
//! ## Why this crate?
//!
//! Reimbursement forms want one document: a table of every cost, the daily
//! subsidy worked out from the travel dates, a grand total, and a picture of
//! each receipt underneath. The receipts arrive as phone photos, scans and
//! PDF e-invoices. This crate turns all of them into the same kind of raster,
//! lays out the table and writes a `.docx` any office suite opens.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ExpenseReport (JSON manifest or built in code)
//!  │
//!  ├─ 1. Normalize  photo → decode, PDF → render page 1 (spawn_blocking)
//!  ├─ 2. Calculate  subsidy days × rate, included rows, total "0.00"
//!  ├─ 3. Compile    title, intro, table, captions, invoice images
//!  ├─ 4. Serialize  Document → DOCX (zip + OOXML parts, reproducible)
//!  └─ 5. Export     ExportSink (directory, memory, …)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trip_expense_report::{export_to_sink, ExportConfig, FileSink, Manifest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = Manifest::load("trip.json")?;
//!     let config = ExportConfig::default();
//!     let output = export_to_sink(&report, &config, &FileSink::new("out")).await?;
//!     for err in &output.invoice_errors {
//!         eprintln!("warning: {err}");
//!     }
//!     println!("total {}", output.stats.total);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `expense-report` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! trip-expense-report = { version = "0.1", default-features = false }
//! ```
//!
//! ## PDF invoices
//!
//! PDF rendering needs the pdfium shared library at run time. Point
//! `PDFIUM_LIB_PATH` at it, or place it in the working directory. Without it
//! PDF invoices fail individually and the rest of the report is unaffected.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod calc;
pub mod compile;
pub mod config;
pub mod docx;
pub mod error;
pub mod export;
pub mod manifest;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod sink;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExportConfig, ExportConfigBuilder, Locale};
pub use docx::DocxSerializer;
pub use error::{CompileError, InvoiceError, NormalizeError, ReportError};
pub use export::{export_report, export_report_sync, export_report_with, export_to_sink, summarize};
pub use manifest::Manifest;
pub use model::{Document, DocumentSerializer};
pub use output::{ExportOutput, ExportStats, ReportSummary, SubsidyLine};
pub use pipeline::normalize::{DecodeBackend, NativeBackend, NormalizedImage};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{DateRange, ExpenseReport, InvoiceSource, LineItem, SourceKind};
pub use sink::{ExportSink, FileSink, MemorySink};
