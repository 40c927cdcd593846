//! Error types for the trip-expense-report library.
//!
//! Failures split by how much of the export they take down:
//!
//! * [`ReportError`]: **Fatal**: the export cannot produce a document at all
//!   (unreadable manifest, invalid config, the container could not be
//!   serialised, the sink refused the bytes).
//!
//! * [`InvoiceError`]: **Non-fatal**: one attached invoice could not be
//!   decoded or rendered. The document is still produced; that item simply
//!   has no image beneath its caption. Collected in
//!   [`crate::output::ExportOutput::invoice_errors`].
//!
//! [`NormalizeError`] and [`CompileError`] are the stage-level errors the
//! two halves are built from.

use crate::report::SourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Manifest file was not found at the given path.
    #[error("Manifest not found: '{path}'\nCheck the path exists and is readable.")]
    ManifestNotFound { path: PathBuf },

    /// Manifest exists but is not a valid report description.
    #[error("Manifest '{path}' is invalid: {detail}")]
    ManifestInvalid { path: PathBuf, detail: String },

    /// An invoice referenced by the manifest could not be read.
    #[error("Failed to read invoice '{path}' of item {item}: {source}")]
    InvoiceReadFailed {
        item: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// The document model could not be serialised.
    #[error("Failed to compile report document: {0}")]
    Compile(#[from] CompileError),

    /// The export sink could not store the finished document.
    #[error("Failed to save '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single invoice.
///
/// `item` is the 1-based position of the project item the invoice belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum InvoiceError {
    /// The still image could not be decoded.
    #[error("Item {item}: invoice image could not be decoded: {detail}")]
    Decode { item: usize, detail: String },

    /// The paginated document could not be opened or its first page rendered.
    #[error("Item {item}: invoice document could not be rendered: {detail}")]
    Render { item: usize, detail: String },
}

impl InvoiceError {
    pub fn item(&self) -> usize {
        match self {
            InvoiceError::Decode { item, .. } | InvoiceError::Render { item, .. } => *item,
        }
    }
}

/// Failure to turn one invoice source into a raster image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// Raster path: the bytes are not a decodable image.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Paginated path: the document could not be opened or rendered.
    #[error("render failed: {0}")]
    Render(String),
}

impl NormalizeError {
    /// The error matching the path a source of `kind` takes.
    pub fn for_kind(kind: SourceKind, detail: impl Into<String>) -> Self {
        match kind {
            SourceKind::Raster => NormalizeError::Decode(detail.into()),
            SourceKind::Paginated => NormalizeError::Render(detail.into()),
        }
    }

    pub fn into_invoice_error(self, item: usize) -> InvoiceError {
        match self {
            NormalizeError::Decode(detail) => InvoiceError::Decode { item, detail },
            NormalizeError::Render(detail) => InvoiceError::Render { item, detail },
        }
    }
}

/// The document model was rejected by the serialisation backend.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Writing into the output buffer failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP container error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An invoice raster could not be encoded for embedding.
    #[error("Image encoding failed: {0}")]
    ImageEncode(#[from] image::ImageError),

    /// The model violates a structural rule of the container format.
    #[error("Invalid document model: {0}")]
    InvalidModel(String),
}
