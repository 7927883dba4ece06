//! Data types flowing between pipeline stages and returned to callers.
//!
//! ```text
//! ImageTask ──transform──▶ TransformResult ──aggregate──▶ ordered successes
//!                                                         │
//!                                          compose ◀──────┘
//!                                             │
//!                                             ▼
//!                                   ConversionOutput { document, failures, stats }
//! ```

use crate::config::PageGeometry;
use crate::error::{Img2PdfError, ItemError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One image to process, with its rank in natural-sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTask {
    /// Zero-based position in the final page sequence.
    pub index: usize,
    pub path: PathBuf,
}

/// Raster formats accepted as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFormat {
    Jpeg,
    Png,
    WebP,
}

impl SourceFormat {
    /// Identify the format from the leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(SourceFormat::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(SourceFormat::Png)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(SourceFormat::WebP)
        } else {
            None
        }
    }

    /// Matching `image` crate format, used to decode without re-guessing.
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            SourceFormat::Jpeg => image::ImageFormat::Jpeg,
            SourceFormat::Png => image::ImageFormat::Png,
            SourceFormat::WebP => image::ImageFormat::WebP,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceFormat::Jpeg => "jpeg",
            SourceFormat::Png => "png",
            SourceFormat::WebP => "webp",
        })
    }
}

/// A successfully transformed image, ready to be placed on a page.
///
/// `payload` is a JPEG stream: the untouched source file on passthrough
/// (baseline or progressive), otherwise a baseline re-encode. The compositor
/// moves it into the document.
#[derive(Clone)]
pub struct TransformedImage {
    pub index: usize,
    pub path: PathBuf,
    pub payload: Vec<u8>,
    /// Physical width on the page, in PDF points.
    pub width_pt: f64,
    /// Physical height on the page, in PDF points.
    pub height_pt: f64,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// `false` when the source bytes were passed through untouched.
    pub was_converted: bool,
    pub source_format: SourceFormat,
}

impl fmt::Debug for TransformedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformedImage")
            .field("index", &self.index)
            .field("path", &self.path)
            .field("payload_len", &self.payload.len())
            .field("width_pt", &self.width_pt)
            .field("height_pt", &self.height_pt)
            .field("pixel_width", &self.pixel_width)
            .field("pixel_height", &self.pixel_height)
            .field("was_converted", &self.was_converted)
            .field("source_format", &self.source_format)
            .finish()
    }
}

/// An image that produced no page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedImage {
    pub index: usize,
    pub path: PathBuf,
    pub error: ItemError,
}

impl FailedImage {
    pub fn new(index: usize, error: ItemError) -> Self {
        Self {
            index,
            path: error.path().to_path_buf(),
            error,
        }
    }
}

/// Outcome of transforming exactly one [`ImageTask`].
#[derive(Debug, Clone)]
pub enum TransformResult {
    Success(TransformedImage),
    Failure(FailedImage),
}

impl TransformResult {
    pub fn index(&self) -> usize {
        match self {
            TransformResult::Success(t) => t.index,
            TransformResult::Failure(f) => f.index,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            TransformResult::Success(t) => &t.path,
            TransformResult::Failure(f) => &f.path,
        }
    }
}

/// Results of one chunk, in the chunk's item order.
pub type ChunkReport = Vec<TransformResult>;

/// Summary counts and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Images discovered and sequenced.
    pub total_images: usize,
    /// Successes that were decoded and re-encoded.
    pub converted: usize,
    /// Successes whose source bytes were embedded untouched.
    pub passed_through: usize,
    /// Images that failed before composition.
    pub failed: usize,
    /// Transformed images the compositor could not place.
    pub placement_failed: usize,
    /// Pages in the final document.
    pub pages: usize,
    /// Effective parallel workers.
    pub workers: usize,
    /// Number of chunks dispatched.
    pub chunks: usize,
    pub transform_duration_ms: u64,
    pub compose_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The finished document plus a per-image report.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Serialised PDF bytes.
    pub document: Vec<u8>,
    /// Every image that contributed no page, ascending by index.
    pub failures: Vec<FailedImage>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Treat any per-image failure as an error.
    ///
    /// Callers that tolerate partial documents can read `failures` directly
    /// instead.
    pub fn into_result(self) -> Result<Self, Img2PdfError> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        let total = self.stats.total_images;
        let failed = self.failures.len();
        Err(Img2PdfError::PartialFailure {
            success: total.saturating_sub(failed),
            failed,
            total,
        })
    }
}

/// Dry-run result: what a conversion would do, without decoding anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionPlan {
    /// Tasks in page order.
    pub tasks: Vec<ImageTask>,
    pub chunk_size: usize,
    pub chunks: usize,
    pub workers: usize,
    pub page: PageGeometry,
}
