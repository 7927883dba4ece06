//! Error types for the edgequake-img2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Img2PdfError`] — **Fatal**: the run cannot proceed at all (input
//!   directory missing, no images discovered, output cannot be written).
//!   Returned as `Err(Img2PdfError)` from the top-level `convert*` functions
//!   and never accompanied by a partial document.
//!
//! * [`ItemError`] — **Non-fatal**: a single image failed (corrupt file,
//!   encoder error, placement error) but every sibling image is unaffected.
//!   Stored inside [`crate::output::FailedImage`] so callers can inspect
//!   partial success rather than losing the whole document to one bad file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-img2pdf library.
///
/// Per-image failures use [`ItemError`] and are reported in
/// [`crate::output::ConversionOutput::failures`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Img2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input directory was not found at the given path.
    #[error("Input directory not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// The input path exists but is not a directory.
    #[error("Input path is not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    /// Process does not have read permission on the input directory.
    #[error("Permission denied reading '{path}'\nTry: chmod +rx {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Enumerating the input directory failed part-way.
    #[error("Failed to read input directory '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Discovery produced zero images; there is nothing to bind.
    #[error("No supported images found in '{location}'\nSupported extensions: png, jpg, jpeg, webp.")]
    NoImages { location: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Every image failed; the document would have no pages.
    #[error("All {total} images failed.\nFirst error: {first_error}")]
    AllImagesFailed { total: usize, first_error: String },

    /// Some images succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`] when
    /// the caller wants to treat any per-image failure as an error.
    #[error("{failed}/{total} images failed during conversion")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    /// The PDF document could not be assembled or serialised.
    #[error("Failed to build PDF document: {0}")]
    DocumentFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory or write the output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image.
///
/// Stored in [`crate::output::FailedImage`]. The run continues with the
/// remaining images; a failed image simply contributes no page.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ItemError {
    /// The file could not be read from disk.
    #[error("{path}: read failed: {detail}")]
    SourceRead { path: PathBuf, detail: String },

    /// The file content is not one of the supported raster formats.
    #[error("{path}: unsupported image format: {detail}")]
    Unsupported { path: PathBuf, detail: String },

    /// The header or pixel data is corrupt.
    #[error("{path}: decode failed: {detail}")]
    Decode { path: PathBuf, detail: String },

    /// Resize or JPEG encode failed on an otherwise readable image.
    #[error("{path}: transform failed: {detail}")]
    Transform { path: PathBuf, detail: String },

    /// The transformed payload could not be placed on its page.
    #[error("{path}: placement failed: {detail}")]
    Placement { path: PathBuf, detail: String },

    /// The worker thread running this image's chunk died.
    #[error("{path}: worker failed: {detail}")]
    WorkerFailed { path: PathBuf, detail: String },
}

impl ItemError {
    /// Path of the image this error belongs to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            ItemError::SourceRead { path, .. }
            | ItemError::Unsupported { path, .. }
            | ItemError::Decode { path, .. }
            | ItemError::Transform { path, .. }
            | ItemError::Placement { path, .. }
            | ItemError::WorkerFailed { path, .. } => path,
        }
    }

    /// Short pipeline stage label, used in logs and JSON reports.
    pub fn stage(&self) -> &'static str {
        match self {
            ItemError::SourceRead { .. } | ItemError::Unsupported { .. } | ItemError::Decode { .. } => {
                "source"
            }
            ItemError::Transform { .. } => "transform",
            ItemError::Placement { .. } => "placement",
            ItemError::WorkerFailed { .. } => "worker",
        }
    }
}
