//! CLI binary for trip-expense-report.
//!
//! A thin shim over the library crate that loads a JSON manifest, maps CLI
//! flags to `ExportConfig` and writes the `.docx` into a directory.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use trip_expense_report::{
    export_to_sink, summarize, ExportConfig, ExportProgressCallback, FileSink, Locale, Manifest,
    ProgressCallback, ReportSummary,
};

// ── Terminal colours ─────────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Invoice progress ─────────────────────────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per invoice.
/// Invoices finish out of order, so start times are kept per item.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading invoices…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn show_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} invoices  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Decoding");
    }

    fn elapsed(&self, item: usize) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&item))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, total_invoices: usize) {
        self.show_bar(total_invoices);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Decoding {total_invoices} invoices…"))
        ));
    }

    fn on_invoice_start(&self, item: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(item, Instant::now());
        }
        self.bar.set_message(format!("item {item}"));
    }

    fn on_invoice_complete(&self, item: usize, _total: usize, width: u32, height: u32) {
        let elapsed = self.elapsed(item);
        self.bar.println(format!(
            "  {} Item {:>3}  {:<12}  {}",
            green("✓"),
            item,
            dim(&format!("{width}x{height}")),
            elapsed,
        ));
        self.bar.inc(1);
    }

    fn on_invoice_error(&self, item: usize, _total: usize, error: &str) {
        let elapsed = self.elapsed(item);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Item {:>3}  {}  {}",
            red("✗"),
            item,
            red(&msg),
            elapsed,
        ));
        self.bar.inc(1);
    }

    fn on_invoice_skipped(&self, item: usize, media_type: &str) {
        let elapsed = self.elapsed(item);
        self.bar.println(format!(
            "  {} Item {:>3}  {}  {}",
            cyan("–"),
            item,
            dim(&format!("skipped ({media_type})")),
            elapsed,
        ));
        self.bar.inc(1);
    }

    fn on_export_complete(&self, embedded: usize, bytes: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} invoices embedded  {}",
                green("✔"),
                bold(&embedded.to_string()),
                dim(&format!("{} KiB", bytes / 1024)),
            );
        } else {
            eprintln!(
                "{} {} invoices embedded  ({} failed)",
                cyan("⚠"),
                bold(&embedded.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Write trip.docx (named after the manifest's file_name) into ./out
  expense-report trip.json -o out

  # English labels, 80 per day subsidy
  expense-report --locale en --rate 80 trip.json

  # Check days and totals without decoding any invoice
  expense-report --summary-only trip.json

  # Machine-readable stats
  expense-report --json trip.json > stats.json

MANIFEST:
  {
    "file_name": "2024-01 Shanghai",
    "travelers": ["Ada", "Grace"],
    "date_range": ["2024-01-01", "2024-01-03"],
    "items": [
      { "category": "train", "date": "2024-01-01", "amount": 553,
        "remark": "G102", "invoice": { "path": "invoices/train.pdf" } }
    ],
    "subsidies": [
      { "category": "subsidy", "date_range": ["2024-01-01", "2024-01-03"], "amount": 150 }
    ]
  }

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium, needed for PDF invoices
  RUST_LOG                Override log filter (e.g. trip_expense_report=debug)
"#;

/// Compile trip-expense line items and invoices into a DOCX report.
#[derive(Parser, Debug)]
#[command(
    name = "expense-report",
    version,
    about = "Compile trip-expense line items and invoices into a DOCX report",
    long_about = "Reads a JSON manifest of project expenses, daily subsidies and invoice files \
(photos or PDFs), computes subsidy days and the grand total, and writes a .docx with the \
expense table followed by one picture per invoice.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// JSON manifest describing the report.
    manifest: PathBuf,

    /// Directory the .docx is written to.
    #[arg(short, long, env = "EXPENSE_REPORT_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Daily subsidy rate.
    #[arg(long, env = "EXPENSE_REPORT_RATE", default_value_t = 50.0)]
    rate: f64,

    /// Width of embedded invoice pictures in pixels (50–2000).
    #[arg(long, env = "EXPENSE_REPORT_IMAGE_WIDTH", default_value_t = 500,
          value_parser = clap::value_parser!(u32).range(50..=2000))]
    image_width: u32,

    /// PDF first-page render scale (0.5–6.0).
    #[arg(long, env = "EXPENSE_REPORT_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// JPEG quality of embedded invoices (1–100).
    #[arg(long, env = "EXPENSE_REPORT_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Language of the report's fixed text.
    #[arg(long, env = "EXPENSE_REPORT_LOCALE", value_enum, default_value = "zh")]
    locale: LocaleArg,

    /// Number of invoices decoded at once.
    #[arg(short, long, env = "EXPENSE_REPORT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Omit the creation timestamp so identical manifests give identical files.
    #[arg(long, env = "EXPENSE_REPORT_REPRODUCIBLE")]
    reproducible: bool,

    /// Print days, amounts and total only; write nothing.
    #[arg(long)]
    summary_only: bool,

    /// Print results as JSON on stdout.
    #[arg(long, env = "EXPENSE_REPORT_JSON")]
    json: bool,

    /// Do not draw the progress bar.
    #[arg(long, env = "EXPENSE_REPORT_NO_PROGRESS")]
    no_progress: bool,

    /// Log at DEBUG level.
    #[arg(short, long, env = "EXPENSE_REPORT_VERBOSE")]
    verbose: bool,

    /// Print errors only.
    #[arg(short, long, env = "EXPENSE_REPORT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum LocaleArg {
    Zh,
    En,
}

impl From<LocaleArg> for Locale {
    fn from(v: LocaleArg) -> Self {
        match v {
            LocaleArg::Zh => Locale::ZhCn,
            LocaleArg::En => Locale::En,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.summary_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let report = Manifest::load(&cli.manifest)
        .with_context(|| format!("Failed to load manifest {}", cli.manifest.display()))?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Summary-only mode ────────────────────────────────────────────────
    if cli.summary_only {
        let summary = summarize(&report, &config);
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
            );
        } else {
            print_summary(&summary);
        }
        return Ok(());
    }

    // ── Export ───────────────────────────────────────────────────────────
    let sink = FileSink::new(&cli.output_dir);
    let output = export_to_sink(&report, &config, &sink)
        .await
        .context("Export failed")?;

    if cli.json {
        let json = serde_json::json!({
            "file": output.saved_to,
            "stats": output.stats,
            "invoice_errors": output.invoice_errors,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        let stats = &output.stats;
        if !show_progress {
            for err in &output.invoice_errors {
                eprintln!("  {} {}", red("✗"), err);
            }
        }
        eprintln!(
            "{}  total {}  {}/{} invoices  {}ms  →  {}",
            if stats.failed_invoices == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&stats.total),
            stats.embedded_invoices,
            stats.invoices,
            stats.total_duration_ms,
            bold(
                &output
                    .saved_to
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ),
        );
        if stats.excluded_subsidies > 0 {
            eprintln!(
                "   {}",
                dim(&format!(
                    "{} subsidy rows left out (missing date range or amount)",
                    stats.excluded_subsidies
                ))
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ExportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder()
        .daily_rate(cli.rate)
        .image_width(cli.image_width)
        .render_scale(cli.scale)
        .jpeg_quality(cli.jpeg_quality)
        .concurrency(cli.concurrency)
        .locale(cli.locale.clone().into());

    if !cli.reproducible {
        builder = builder.created(chrono::Utc::now());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(summary: &ReportSummary) {
    println!("File:         {}", summary.file_name);
    println!("Travelers:    {}", summary.travelers.join(", "));
    println!(
        "Items:        {} ({} with invoice)",
        summary.project_items, summary.invoices
    );
    for (i, s) in summary.subsidies.iter().enumerate() {
        println!(
            "Subsidy {:>3}:  {:<12} {:>3} days  computed {:<8} entered {:<8} {}",
            i + 1,
            s.category.as_deref().unwrap_or("-"),
            s.days,
            s.computed_amount,
            s.amount.map(|a| a.to_string()).unwrap_or_else(|| "-".into()),
            if s.included {
                s.remark.clone().unwrap_or_default()
            } else {
                dim("(left out)")
            },
        );
    }
    println!("Total:        {}", bold(&summary.total));
}
