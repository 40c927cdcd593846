//! Invoice normalisation: any supported source → RGB raster with known size.
//!
//! Two paths, chosen by declared media type:
//!
//! * `image/*`: decoded with the `image` crate at native resolution.
//! * `application/pdf`: first page rendered by pdfium at
//!   [`ExportConfig::render_scale`].
//!
//! Every other media type is skipped (`Ok(None)`), not failed.
//!
//! ## Scratch files
//!
//! Each source is copied into a scratch file before decoding, since pdfium
//! opens documents from a path. The copy is owned by a [`StagedSource`]
//! guard whose `Drop` deletes it, so it disappears on every exit path:
//! success, decode error, or a panic inside the decoder.
//!
//! ## Why spawn_blocking?
//!
//! pdfium keeps thread-local state and is not async-safe, and decoding a
//! 12-megapixel phone photo is several hundred milliseconds of CPU. Both run
//! on Tokio's blocking pool so the worker threads stay responsive.

use crate::config::ExportConfig;
use crate::error::NormalizeError;
use crate::progress::ProgressCallback;
use crate::report::{InvoiceSource, SourceKind};
use image::{DynamicImage, RgbImage};
use pdfium_render::prelude::*;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// A decoded invoice: opaque RGB pixels plus their true dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    pub pixels: RgbImage,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    /// Flatten a decoded image to RGB. The alpha channel is dropped because
    /// invoices are embedded on an opaque page.
    ///
    /// Returns `None` for an image with a zero dimension.
    pub fn from_dynamic(image: DynamicImage) -> Option<Self> {
        let pixels = image.to_rgb8();
        let (width, height) = pixels.dimensions();
        (width > 0 && height > 0).then_some(Self {
            pixels,
            width,
            height,
        })
    }
}

/// Decoding capability the normaliser depends on.
///
/// Both methods receive the path of a staged scratch copy and run on a
/// blocking thread.
pub trait DecodeBackend: Send + Sync {
    /// Decode a still image at its native pixel size.
    fn decode_raster(&self, path: &Path) -> Result<NormalizedImage, NormalizeError>;

    /// Render only the first page of a paginated document at `scale`.
    fn decode_first_page(&self, path: &Path, scale: f32) -> Result<NormalizedImage, NormalizeError>;
}

/// Default backend: `image` for rasters, pdfium for PDFs.
///
/// pdfium is bound on each call: from `PDFIUM_LIB_PATH` if set, otherwise
/// from the working directory, otherwise from the system library path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl DecodeBackend for NativeBackend {
    fn decode_raster(&self, path: &Path) -> Result<NormalizedImage, NormalizeError> {
        let bytes = std::fs::read(path).map_err(|e| NormalizeError::Decode(e.to_string()))?;
        let image =
            image::load_from_memory(&bytes).map_err(|e| NormalizeError::Decode(e.to_string()))?;
        NormalizedImage::from_dynamic(image)
            .ok_or_else(|| NormalizeError::Decode("image has no pixels".into()))
    }

    fn decode_first_page(&self, path: &Path, scale: f32) -> Result<NormalizedImage, NormalizeError> {
        let pdfium = bind_pdfium()?;

        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| NormalizeError::Render(format!("cannot open document: {e:?}")))?;

        let pages = document.pages();
        if pages.len() == 0 {
            return Err(NormalizeError::Render("document has no pages".into()));
        }

        let page = pages
            .get(0)
            .map_err(|e| NormalizeError::Render(format!("cannot load page 1: {e:?}")))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| NormalizeError::Render(format!("cannot render page 1: {e:?}")))?;

        NormalizedImage::from_dynamic(bitmap.as_image())
            .ok_or_else(|| NormalizeError::Render("page rendered to an empty bitmap".into()))
    }
}

fn bind_pdfium() -> Result<Pdfium, NormalizeError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| NormalizeError::Render(format!("pdfium library unavailable: {e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// A scratch copy of an invoice source, deleted when dropped.
pub struct StagedSource {
    file: Option<NamedTempFile>,
    item: usize,
    callback: Option<ProgressCallback>,
}

impl StagedSource {
    /// Copy `bytes` into a fresh scratch file.
    ///
    /// The guard exists before the first byte is written, so a failed write
    /// still releases the file exactly once.
    pub fn stage(
        bytes: &[u8],
        item: usize,
        callback: Option<ProgressCallback>,
    ) -> std::io::Result<Self> {
        let file = tempfile::Builder::new().prefix("invoice-").tempfile()?;
        if let Some(ref cb) = callback {
            cb.on_source_staged(item);
        }
        let mut staged = Self {
            file: Some(file),
            item,
            callback,
        };
        if let Some(file) = staged.file.as_mut() {
            file.write_all(bytes)?;
            file.flush()?;
        }
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        match self.file {
            Some(ref f) => f.path(),
            None => Path::new(""),
        }
    }
}

impl Drop for StagedSource {
    fn drop(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        if let Err(e) = file.close() {
            warn!("Failed to remove scratch copy of invoice {}: {}", self.item, e);
        }
        if let Some(ref cb) = self.callback {
            cb.on_source_released(self.item);
        }
    }
}

/// Rasterise one invoice source.
///
/// `item` is the 1-based project item number, used for logging and
/// progress events.
///
/// # Returns
/// - `Ok(Some(image))`: decoded
/// - `Ok(None)`: media type not supported; nothing was attempted
/// - `Err(NormalizeError::Decode)` / `Err(NormalizeError::Render)`: failed
pub async fn normalize(
    item: usize,
    source: &InvoiceSource,
    config: &ExportConfig,
) -> Result<Option<NormalizedImage>, NormalizeError> {
    let Some(kind) = source.kind() else {
        debug!(
            "Item {}: media type '{}' is not an image or PDF, skipping",
            item, source.media_type
        );
        return Ok(None);
    };

    let bytes = source.bytes.clone();
    let backend = Arc::clone(&config.backend);
    let callback = config.progress_callback.clone();
    let scale = config.render_scale;

    let image = tokio::task::spawn_blocking(move || {
        let staged = StagedSource::stage(&bytes, item, callback)
            .map_err(|e| NormalizeError::for_kind(kind, format!("cannot stage source: {e}")))?;
        match kind {
            SourceKind::Raster => backend.decode_raster(staged.path()),
            SourceKind::Paginated => backend.decode_first_page(staged.path(), scale),
        }
    })
    .await
    .map_err(|e| NormalizeError::for_kind(kind, format!("decode task panicked: {e}")))??;

    debug!(
        "Item {}: normalised {:?} source → {}x{} px",
        item, kind, image.width, image.height
    );
    Ok(Some(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ExportProgressCallback;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([200, 30, 30, 255]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        buf
    }

    #[derive(Default)]
    struct HandleCounter {
        staged: AtomicUsize,
        released: AtomicUsize,
    }

    impl ExportProgressCallback for HandleCounter {
        fn on_source_staged(&self, _item: usize) {
            self.staged.fetch_add(1, Ordering::SeqCst);
        }

        fn on_source_released(&self, _item: usize) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Records which path was taken; PDF "rendering" yields a fixed page.
    #[derive(Default)]
    struct FakeBackend {
        fail_pages: bool,
        seen: Mutex<Vec<(PathBuf, Option<f32>)>>,
    }

    impl DecodeBackend for FakeBackend {
        fn decode_raster(&self, path: &Path) -> Result<NormalizedImage, NormalizeError> {
            self.seen.lock().unwrap().push((path.to_path_buf(), None));
            NativeBackend.decode_raster(path)
        }

        fn decode_first_page(
            &self,
            path: &Path,
            scale: f32,
        ) -> Result<NormalizedImage, NormalizeError> {
            self.seen.lock().unwrap().push((path.to_path_buf(), Some(scale)));
            assert!(path.exists(), "scratch file must exist while decoding");
            if self.fail_pages {
                return Err(NormalizeError::Render("encrypted".into()));
            }
            let w = (595.0 * scale) as u32;
            let h = (842.0 * scale) as u32;
            Ok(NormalizedImage::from_dynamic(DynamicImage::new_rgb8(w, h)).unwrap())
        }
    }

    #[tokio::test]
    async fn raster_keeps_true_dimensions() {
        let source = InvoiceSource::new("image/png", png_bytes(800, 600));
        let image = normalize(1, &source, &ExportConfig::default())
            .await
            .expect("valid png")
            .expect("png is supported");
        assert_eq!((image.width, image.height), (800, 600));
        assert_eq!(image.pixels.dimensions(), (800, 600));
        assert_eq!(image.pixels.get_pixel(0, 0).0, [200, 30, 30]);
    }

    #[tokio::test]
    async fn malformed_raster_fails_and_releases_once() {
        let counter = Arc::new(HandleCounter::default());
        let config = ExportConfig::builder()
            .progress_callback(counter.clone())
            .build()
            .unwrap();

        let source = InvoiceSource::new("image/jpeg", b"definitely not a jpeg".to_vec());
        let err = normalize(4, &source, &config).await.unwrap_err();

        assert!(matches!(err, NormalizeError::Decode(_)), "got {err:?}");
        assert_eq!(counter.staged.load(Ordering::SeqCst), 1);
        assert_eq!(counter.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsupported_media_type_is_skipped() {
        let counter = Arc::new(HandleCounter::default());
        let config = ExportConfig::builder()
            .progress_callback(counter.clone())
            .build()
            .unwrap();

        let source = InvoiceSource::new("text/plain", b"hello".to_vec());
        assert_eq!(normalize(1, &source, &config).await, Ok(None));
        assert_eq!(counter.staged.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pdf_routes_to_first_page_with_scale() {
        let backend = Arc::new(FakeBackend::default());
        let config = ExportConfig::builder()
            .backend(backend.clone())
            .build()
            .unwrap();

        let source = InvoiceSource::new("application/pdf", b"%PDF-1.4 stub".to_vec());
        let image = normalize(2, &source, &config).await.unwrap().unwrap();

        assert_eq!((image.width, image.height), (1190, 1684));
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, Some(2.0));
        assert!(!seen[0].0.exists(), "scratch file must be gone afterwards");
    }

    #[tokio::test]
    async fn render_failure_releases_scratch_file() {
        let counter = Arc::new(HandleCounter::default());
        let backend = Arc::new(FakeBackend {
            fail_pages: true,
            ..FakeBackend::default()
        });
        let config = ExportConfig::builder()
            .backend(backend.clone())
            .progress_callback(counter.clone())
            .build()
            .unwrap();

        let source = InvoiceSource::new("application/pdf", b"%PDF-1.7".to_vec());
        let err = normalize(1, &source, &config).await.unwrap_err();

        assert_eq!(err, NormalizeError::Render("encrypted".into()));
        assert_eq!(counter.released.load(Ordering::SeqCst), 1);
        assert!(!backend.seen.lock().unwrap()[0].0.exists());
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        assert!(NormalizedImage::from_dynamic(DynamicImage::new_rgb8(0, 10)).is_none());
    }

    #[test]
    fn staged_source_removed_on_drop() {
        let staged = StagedSource::stage(b"bytes", 1, None).unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
        drop(staged);
        assert!(!path.exists());
    }

    /// Real pdfium render; needs the shared library.
    /// Run with: PDFIUM_TESTS=1 PDFIUM_LIB_PATH=/path/to/libpdfium cargo test
    #[tokio::test]
    async fn pdfium_renders_first_page() {
        if std::env::var("PDFIUM_TESTS").is_err() {
            println!("SKIP: set PDFIUM_TESTS=1 to run pdfium tests");
            return;
        }
        let source = InvoiceSource::new("application/pdf", MINIMAL_PDF.as_bytes().to_vec());
        let image = normalize(1, &source, &ExportConfig::default())
            .await
            .expect("render")
            .expect("pdf is supported");
        // 200 × 100 pt page at 2×.
        assert_eq!((image.width, image.height), (400, 200));
    }

    const MINIMAL_PDF: &str = "%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 200 100] >> endobj
trailer << /Root 1 0 R >>
%%EOF
";
}
