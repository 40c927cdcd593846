//! Progress-callback trait for per-invoice export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive events
//! as invoices are staged, decoded and released.
//!
//! # Example
//!
//! ```rust
//! use trip_expense_report::{ExportConfig, ExportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl ExportProgressCallback for Counter {
//!     fn on_invoice_complete(&self, item: usize, total: usize, width: u32, height: u32) {
//!         let done = self.0.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("invoice of item {item}: {width}x{height} ({done}/{total})");
//!     }
//! }
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the export pipeline as it processes invoices.
///
/// Invoices are normalised concurrently, so every method may be called from
/// several threads at once. All methods default to no-ops.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once before any invoice is decoded.
    ///
    /// * `total_invoices`: project items that carry an invoice source
    fn on_export_start(&self, total_invoices: usize) {
        let _ = total_invoices;
    }

    /// Called before an invoice is decoded. `item` is 1-based.
    fn on_invoice_start(&self, item: usize, total_invoices: usize) {
        let _ = (item, total_invoices);
    }

    /// Called when an invoice was rasterised successfully.
    fn on_invoice_complete(&self, item: usize, total_invoices: usize, width: u32, height: u32) {
        let _ = (item, total_invoices, width, height);
    }

    /// Called when an invoice failed to decode or render.
    fn on_invoice_error(&self, item: usize, total_invoices: usize, error: &str) {
        let _ = (item, total_invoices, error);
    }

    /// Called when an invoice has a media type that cannot be rasterised.
    fn on_invoice_skipped(&self, item: usize, media_type: &str) {
        let _ = (item, media_type);
    }

    /// Called when a source has been copied to a scratch file for decoding.
    fn on_source_staged(&self, item: usize) {
        let _ = item;
    }

    /// Called when that scratch file has been removed. Exactly once per
    /// [`Self::on_source_staged`], on success and failure alike.
    fn on_source_released(&self, item: usize) {
        let _ = item;
    }

    /// Called once after the document has been compiled.
    ///
    /// * `embedded`: invoices that made it into the document
    /// * `bytes`   : size of the finished container
    fn on_export_complete(&self, embedded: usize, bytes: usize) {
        let _ = (embedded, bytes);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        staged: AtomicUsize,
        released: AtomicUsize,
    }

    impl ExportProgressCallback for TrackingCallback {
        fn on_invoice_start(&self, _item: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_invoice_complete(&self, _item: usize, _total: usize, _w: u32, _h: u32) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_invoice_error(&self, _item: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_source_staged(&self, _item: usize) {
            self.staged.fetch_add(1, Ordering::SeqCst);
        }

        fn on_source_released(&self, _item: usize) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_export_start(2);
        cb.on_invoice_start(1, 2);
        cb.on_invoice_complete(1, 2, 800, 600);
        cb.on_invoice_error(2, 2, "bad bytes");
        cb.on_invoice_skipped(3, "text/plain");
        cb.on_source_staged(1);
        cb.on_source_released(1);
        cb.on_export_complete(1, 4096);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_invoice_start(1, 2);
        tracker.on_source_staged(1);
        tracker.on_source_released(1);
        tracker.on_invoice_complete(1, 2, 10, 10);
        tracker.on_invoice_start(2, 2);
        tracker.on_invoice_error(2, 2, "truncated");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(
            tracker.staged.load(Ordering::SeqCst),
            tracker.released.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_export_start(1);
        cb.on_export_complete(0, 0);
    }
}
