//! Invoice stages of report export.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! InvoiceSource ──▶ normalize ──▶ encode ──▶ docx media part
//! (bytes + type)   (image/pdfium)  (JPEG)
//! ```
//!
//! 1. [`normalize`]: stage the source to a scratch file and decode it to an
//!    RGB raster; runs in `spawn_blocking` because pdfium is not async-safe
//! 2. [`encode`]: JPEG-encode the raster for embedding

pub mod encode;
pub mod normalize;
