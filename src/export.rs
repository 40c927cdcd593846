//! Report export entry points.
//!
//! ```text
//! ExpenseReport
//!  │
//!  ├─ 1. Normalize  decode every invoice, bounded concurrency
//!  ├─ 2. Calculate  subsidy days, included rows, grand total
//!  ├─ 3. Compile    build the Document, JPEG-encode decoded invoices
//!  ├─ 4. Serialize  Document → .docx bytes
//!  └─ 5. Save       optional, through an ExportSink
//! ```
//!
//! A failed invoice never fails the export: the item keeps its caption, loses
//! its picture and the error is reported in [`ExportOutput::invoice_errors`].

use crate::calc;
use crate::compile;
use crate::config::ExportConfig;
use crate::docx::DocxSerializer;
use crate::error::{InvoiceError, ReportError};
use crate::model::DocumentSerializer;
use crate::output::{ExportOutput, ExportStats, ReportSummary, SubsidyLine};
use crate::pipeline::normalize::{self, NormalizedImage};
use crate::report::{ExpenseReport, LineItem};
use crate::sink::ExportSink;
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Compile a report into a DOCX container.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ExportOutput)` on success, even if some invoices failed
/// (check `output.invoice_errors`).
///
/// # Errors
/// Returns `Err(ReportError)` only when no document can be produced.
///
/// # Example
/// ```rust,no_run
/// use trip_expense_report::{export_report, ExpenseReport, ExportConfig, LineItem};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let report = ExpenseReport {
///     travelers: vec!["Ada".into()],
///     items: vec![LineItem::new("train").with_amount(120.0)],
///     ..ExpenseReport::default()
/// };
/// let output = export_report(&report, &ExportConfig::default()).await?;
/// std::fs::write(&output.file_name, &output.bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn export_report(
    report: &ExpenseReport,
    config: &ExportConfig,
) -> Result<ExportOutput, ReportError> {
    export_report_with(report, config, &DocxSerializer).await
}

/// [`export_report`] with a caller-chosen container format.
pub async fn export_report_with(
    report: &ExpenseReport,
    config: &ExportConfig,
    serializer: &dyn DocumentSerializer,
) -> Result<ExportOutput, ReportError> {
    config.validate()?;
    let total_start = Instant::now();
    let file_name = report.output_file_name(serializer.extension());
    info!(
        "Exporting '{}': {} items, {} subsidies",
        file_name,
        report.items.len(),
        report.subsidies.len()
    );

    // ── Step 1: Normalize invoices ───────────────────────────────────────
    let normalize_start = Instant::now();
    let invoices = normalize_invoices(&report.items, config).await;
    let normalize_duration_ms = normalize_start.elapsed().as_millis() as u64;
    info!(
        "Normalized {}/{} invoices in {}ms",
        invoices.embedded(),
        invoices.total,
        normalize_duration_ms
    );

    // ── Step 2: Calculate ────────────────────────────────────────────────
    let included_subsidies = report
        .subsidies
        .iter()
        .filter(|s| calc::is_included(s))
        .count();
    let total = calc::total(&report.items, &report.subsidies);
    debug!("Grand total {} ({} subsidies included)", total, included_subsidies);

    // ── Step 3+4: Compile and serialize ──────────────────────────────────
    let compile_start = Instant::now();
    let document = compile::build(
        report,
        &report.items,
        &report.subsidies,
        &invoices.images,
        config,
    )?;
    let bytes = serializer.serialize(&document)?;
    let compile_duration_ms = compile_start.elapsed().as_millis() as u64;

    let stats = ExportStats {
        project_items: report.items.len(),
        included_subsidies,
        excluded_subsidies: report.subsidies.len() - included_subsidies,
        invoices: invoices.total,
        embedded_invoices: invoices.embedded(),
        failed_invoices: invoices.errors.len(),
        skipped_invoices: invoices.skipped,
        total,
        document_bytes: bytes.len(),
        normalize_duration_ms,
        compile_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Export complete: {} bytes, {}ms total",
        stats.document_bytes, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_export_complete(stats.embedded_invoices, stats.document_bytes);
    }

    Ok(ExportOutput {
        file_name,
        bytes,
        invoice_errors: invoices.errors,
        stats,
        saved_to: None,
    })
}

/// Compile a report and hand it to `sink`.
pub async fn export_to_sink(
    report: &ExpenseReport,
    config: &ExportConfig,
    sink: &dyn ExportSink,
) -> Result<ExportOutput, ReportError> {
    let mut output = export_report(report, config).await?;
    output.saved_to = Some(sink.save(&output.bytes, &output.file_name)?);
    Ok(output)
}

/// Synchronous wrapper around [`export_report`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_report_sync(
    report: &ExpenseReport,
    config: &ExportConfig,
) -> Result<ExportOutput, ReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export_report(report, config))
}

/// Compute the report's figures without touching any invoice.
pub fn summarize(report: &ExpenseReport, config: &ExportConfig) -> ReportSummary {
    ReportSummary {
        file_name: report.output_file_name(DocxSerializer.extension()),
        travelers: report.travelers.clone(),
        project_items: report.items.len(),
        invoices: report.items.iter().filter(|i| i.invoice.is_some()).count(),
        subsidies: report
            .subsidies
            .iter()
            .map(|s| SubsidyLine {
                category: s.category.clone(),
                days: calc::days(s),
                computed_amount: calc::amount(s, config.daily_rate),
                amount: s.amount,
                remark: calc::remark(s, config.locale),
                included: calc::is_included(s),
            })
            .collect(),
        total: calc::total(&report.items, &report.subsidies),
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Outcome of the normalisation stage; `images[i]` belongs to `items[i]`.
struct NormalizedInvoices {
    images: Vec<Option<NormalizedImage>>,
    errors: Vec<InvoiceError>,
    skipped: usize,
    total: usize,
}

impl NormalizedInvoices {
    fn embedded(&self) -> usize {
        self.images.iter().filter(|i| i.is_some()).count()
    }
}

/// Decode every attached invoice, at most `config.concurrency` at a time.
///
/// Tasks finish in any order; each result carries its item index and lands
/// in its own slot once all tasks have settled.
async fn normalize_invoices(items: &[LineItem], config: &ExportConfig) -> NormalizedInvoices {
    let jobs: Vec<_> = items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| item.invoice.as_ref().map(|src| (idx, src)))
        .collect();
    let total = jobs.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_export_start(total);
    }

    let results: Vec<_> = stream::iter(jobs.into_iter().map(|(idx, source)| async move {
        let item = idx + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_invoice_start(item, total);
        }
        let result = normalize::normalize(item, source, config).await;
        if let Some(ref cb) = config.progress_callback {
            match &result {
                Ok(Some(image)) => cb.on_invoice_complete(item, total, image.width, image.height),
                Ok(None) => cb.on_invoice_skipped(item, &source.media_type),
                Err(e) => cb.on_invoice_error(item, total, &e.to_string()),
            }
        }
        (idx, source, result)
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    let mut out = NormalizedInvoices {
        images: vec![None; items.len()],
        errors: Vec::new(),
        skipped: 0,
        total,
    };
    for (idx, source, result) in results {
        match result {
            Ok(Some(image)) => out.images[idx] = Some(image),
            Ok(None) => {
                warn!(
                    "Item {}: invoice of type '{}' cannot be embedded, skipping",
                    idx + 1,
                    source.media_type
                );
                out.skipped += 1;
            }
            Err(e) => {
                let err = e.into_invoice_error(idx + 1);
                warn!("{}", err);
                out.errors.push(err);
            }
        }
    }
    out.errors.sort_by_key(InvoiceError::item);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ExportProgressCallback;
    use crate::report::{DateRange, InvoiceSource};
    use crate::sink::MemorySink;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn png(w: u32, h: u32) -> InvoiceSource {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([0, 90, 200])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        InvoiceSource::new("image/png", buf)
    }

    fn report() -> ExpenseReport {
        ExpenseReport {
            file_name: Some("上海出差".into()),
            travelers: vec!["张三".into()],
            date_range: Some(DateRange::new("2024-01-01", "2024-01-03")),
            items: vec![
                LineItem::new("火车票")
                    .with_amount(553.0)
                    .with_remark("高铁")
                    .with_invoice(png(800, 600)),
                LineItem::new("酒店")
                    .with_amount(800.0)
                    .with_remark("酒店")
                    .with_invoice(InvoiceSource::new("image/jpeg", b"broken".to_vec())),
                LineItem::new("打车")
                    .with_amount(35.5)
                    .with_invoice(InvoiceSource::new("text/plain", b"receipt".to_vec())),
            ],
            subsidies: vec![
                LineItem::new("出差补贴")
                    .with_range("2024-01-01", "2024-01-03")
                    .with_amount(150.0),
                LineItem::new("出差补贴"),
            ],
            ..ExpenseReport::default()
        }
    }

    #[derive(Default)]
    struct Events {
        start: AtomicUsize,
        complete: AtomicUsize,
        error: AtomicUsize,
        skipped: AtomicUsize,
        staged: AtomicUsize,
        released: AtomicUsize,
        done: AtomicUsize,
    }

    impl ExportProgressCallback for Events {
        fn on_export_start(&self, total: usize) {
            self.start.store(total, Ordering::SeqCst);
        }
        fn on_invoice_complete(&self, _: usize, _: usize, _: u32, _: u32) {
            self.complete.fetch_add(1, Ordering::SeqCst);
        }
        fn on_invoice_error(&self, _: usize, _: usize, _: &str) {
            self.error.fetch_add(1, Ordering::SeqCst);
        }
        fn on_invoice_skipped(&self, _: usize, _: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
        fn on_source_staged(&self, _: usize) {
            self.staged.fetch_add(1, Ordering::SeqCst);
        }
        fn on_source_released(&self, _: usize) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
        fn on_export_complete(&self, _: usize, _: usize) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn failed_invoice_does_not_fail_export() {
        let events = Arc::new(Events::default());
        let config = ExportConfig::builder()
            .progress_callback(events.clone())
            .build()
            .unwrap();

        let output = export_report(&report(), &config).await.unwrap();

        assert_eq!(output.file_name, "上海出差.docx");
        assert_eq!(output.invoice_errors.len(), 1);
        assert!(
            matches!(output.invoice_errors[0], InvoiceError::Decode { item: 2, .. }),
            "got {:?}",
            output.invoice_errors
        );

        let s = &output.stats;
        assert_eq!(
            (s.invoices, s.embedded_invoices, s.failed_invoices, s.skipped_invoices),
            (3, 1, 1, 1)
        );
        assert_eq!((s.included_subsidies, s.excluded_subsidies), (1, 1));
        assert_eq!(s.total, "1538.50");
        assert_eq!(s.document_bytes, output.bytes.len());

        assert_eq!(events.start.load(Ordering::SeqCst), 3);
        assert_eq!(events.complete.load(Ordering::SeqCst), 1);
        assert_eq!(events.error.load(Ordering::SeqCst), 1);
        assert_eq!(events.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(events.staged.load(Ordering::SeqCst), 2);
        assert_eq!(events.released.load(Ordering::SeqCst), 2);
        assert_eq!(events.done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn export_to_sink_saves_under_report_name() {
        let sink = MemorySink::new();
        let output = export_to_sink(&report(), &ExportConfig::default(), &sink)
            .await
            .unwrap();
        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "上海出差.docx");
        assert_eq!(saved[0].1, output.bytes);
        assert_eq!(output.saved_to.as_deref(), Some(std::path::Path::new("上海出差.docx")));
    }

    #[test]
    fn sync_wrapper_runs_outside_runtime() {
        let output = export_report_sync(&ExpenseReport::default(), &ExportConfig::default()).unwrap();
        assert_eq!(output.file_name, "expense-report.docx");
        assert_eq!(output.stats.total, "0.00");
        assert!(output.bytes.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn very_wide_invoice_still_exports() {
        let report = ExpenseReport {
            items: vec![LineItem::new("receipt strip")
                .with_amount(12.0)
                .with_invoice(png(1200, 1))],
            ..ExpenseReport::default()
        };
        let output = export_report(&report, &ExportConfig::default())
            .await
            .unwrap();
        assert!(output.invoice_errors.is_empty());
        assert_eq!(output.stats.embedded_invoices, 1);
    }

    #[tokio::test]
    async fn invalid_literal_config_is_rejected() {
        let config = ExportConfig {
            daily_rate: -5.0,
            ..ExportConfig::default()
        };
        let err = export_report(&report(), &config).await.unwrap_err();
        assert!(matches!(err, ReportError::InvalidConfig(_)), "got {err:?}");
    }

    #[test]
    fn summary_without_decoding() {
        let summary = summarize(&report(), &ExportConfig::default());
        assert_eq!(summary.invoices, 3);
        assert_eq!(summary.subsidies.len(), 2);
        assert_eq!(summary.subsidies[0].days, 3);
        assert_eq!(summary.subsidies[0].computed_amount, 150.0);
        assert!(summary.subsidies[0].included);
        assert!(!summary.subsidies[1].included);
        assert_eq!(summary.total, "1538.50");
    }
}
