//! Configuration types for image-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The config is built once per run and
//! passed by reference into every stage; nothing in the pipeline reads
//! ambient or global settings.
//!
//! # Policy constants
//! [`DEFAULT_RESIZE_TOLERANCE`] and [`DEFAULT_DPI`] are inherited policy
//! values. They are kept as named constants so a caller can override them
//! through the builder without patching the pipeline.

use crate::error::Img2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fallback DPI when an image carries no density metadata.
pub const DEFAULT_DPI: f64 = 300.0;

/// Lowest DPI accepted from the builder or an image header.
pub const MIN_DPI: f64 = 1.0;

/// Highest DPI accepted from the builder or an image header.
pub const MAX_DPI: f64 = 1200.0;

/// Relative size difference (per axis) below which an image is not resized.
pub const DEFAULT_RESIZE_TOLERANCE: f64 = 0.01;

/// JPEG quality used when an image has to be re-encoded.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Number of images handed to one worker invocation.
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// Upper bound on parallel workers before the CPU count is considered.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// PDF user-space units per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

const POINTS_PER_MM: f64 = POINTS_PER_INCH / 25.4;

/// Configuration for an image-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_img2pdf::{ConversionConfig, PageSize};
///
/// let config = ConversionConfig::builder()
///     .page_size(PageSize::Letter)
///     .dpi(150.0)
///     .max_workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_workers, 4);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Page size of every page in the output document. Default: A4.
    pub page_size: PageSize,

    /// Target DPI, and the fallback for images without density metadata.
    /// Range: 1–1200. Default: 300.
    pub dpi: f64,

    /// JPEG quality (1–100) for re-encoded images. Default: 80.
    pub jpeg_quality: u8,

    /// Images per chunk. Default: 5.
    pub chunk_size: usize,

    /// Upper bound on parallel workers. Default: 10.
    ///
    /// The effective count is also capped by the available CPU parallelism
    /// and by the number of chunks.
    pub max_workers: usize,

    /// Per-axis relative difference tolerated before resizing. Default: 0.01.
    pub resize_tolerance: f64,

    /// Optional `/Title` for the PDF `/Info` dictionary.
    pub title: Option<String>,

    /// Receives pipeline events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            dpi: DEFAULT_DPI,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            resize_tolerance: DEFAULT_RESIZE_TOLERANCE,
            title: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("page_size", &self.page_size)
            .field("dpi", &self.dpi)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("chunk_size", &self.chunk_size)
            .field("max_workers", &self.max_workers)
            .field("resize_tolerance", &self.resize_tolerance)
            .field("title", &self.title)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The fixed page geometry shared by the transformer and compositor.
    pub fn page_geometry(&self) -> PageGeometry {
        let (width_pt, height_pt) = self.page_size.dimensions_pt();
        PageGeometry {
            width_pt,
            height_pt,
            dpi: self.dpi,
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn dpi(mut self, dpi: f64) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n.max(1);
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = n.max(1);
        self
    }

    pub fn resize_tolerance(mut self, tolerance: f64) -> Self {
        self.config.resize_tolerance = tolerance;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Img2PdfError> {
        let c = &self.config;
        if !c.dpi.is_finite() || !(MIN_DPI..=MAX_DPI).contains(&c.dpi) {
            return Err(Img2PdfError::InvalidConfig(format!(
                "DPI must be {MIN_DPI}–{MAX_DPI}, got {}",
                c.dpi
            )));
        }
        if !c.resize_tolerance.is_finite() || c.resize_tolerance < 0.0 {
            return Err(Img2PdfError::InvalidConfig(format!(
                "Resize tolerance must be a non-negative number, got {}",
                c.resize_tolerance
            )));
        }
        let (w, h) = c.page_size.dimensions_pt();
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(Img2PdfError::InvalidConfig(format!(
                "Page size must be positive, got {w}×{h} pt"
            )));
        }
        Ok(self.config)
    }
}

// ── Page geometry ────────────────────────────────────────────────────────

/// Page size of the output document.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// ISO A3, 297 × 420 mm.
    A3,
    /// ISO A4, 210 × 297 mm. (default)
    #[default]
    A4,
    /// ISO A5, 148 × 210 mm.
    A5,
    /// US Letter, 8.5 × 11 in.
    Letter,
    /// US Legal, 8.5 × 14 in.
    Legal,
    /// Arbitrary size in PDF points.
    Custom { width_pt: f64, height_pt: f64 },
}

impl PageSize {
    /// Page width and height in PDF points.
    pub fn dimensions_pt(&self) -> (f64, f64) {
        match *self {
            PageSize::A3 => (297.0 * POINTS_PER_MM, 420.0 * POINTS_PER_MM),
            PageSize::A4 => (210.0 * POINTS_PER_MM, 297.0 * POINTS_PER_MM),
            PageSize::A5 => (148.0 * POINTS_PER_MM, 210.0 * POINTS_PER_MM),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Custom {
                width_pt,
                height_pt,
            } => (width_pt, height_pt),
        }
    }
}

impl FromStr for PageSize {
    type Err = Img2PdfError;

    /// Parse `a3`, `a4`, `a5`, `letter`, `legal`, or `<w>x<h>` in points.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "a3" => Ok(PageSize::A3),
            "a4" => Ok(PageSize::A4),
            "a5" => Ok(PageSize::A5),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            other => {
                let (w, h) = other.split_once('x').ok_or_else(|| {
                    Img2PdfError::InvalidConfig(format!("Unknown page size '{other}'"))
                })?;
                let parse = |v: &str| {
                    v.trim().parse::<f64>().map_err(|_| {
                        Img2PdfError::InvalidConfig(format!("Invalid page dimension '{v}'"))
                    })
                };
                Ok(PageSize::Custom {
                    width_pt: parse(w)?,
                    height_pt: parse(h)?,
                })
            }
        }
    }
}

/// Fixed page geometry for one run: page size in points plus the target DPI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_pt: f64,
    pub height_pt: f64,
    pub dpi: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy_constants() {
        let c = ConversionConfig::default();
        assert_eq!(c.dpi, DEFAULT_DPI);
        assert_eq!(c.resize_tolerance, DEFAULT_RESIZE_TOLERANCE);
        assert_eq!(c.jpeg_quality, 80);
        assert_eq!(c.chunk_size, 5);
        assert_eq!(c.max_workers, 10);
        assert_eq!(c.page_size, PageSize::A4);
    }

    #[test]
    fn builder_clamps_counts() {
        let c = ConversionConfig::builder()
            .chunk_size(0)
            .max_workers(0)
            .jpeg_quality(0)
            .build()
            .unwrap();
        assert_eq!(c.chunk_size, 1);
        assert_eq!(c.max_workers, 1);
        assert_eq!(c.jpeg_quality, 1);
    }

    #[test]
    fn builder_rejects_bad_dpi() {
        assert!(ConversionConfig::builder().dpi(0.0).build().is_err());
        assert!(ConversionConfig::builder().dpi(f64::NAN).build().is_err());
        assert!(ConversionConfig::builder().dpi(5000.0).build().is_err());
    }

    #[test]
    fn builder_rejects_negative_tolerance() {
        assert!(ConversionConfig::builder()
            .resize_tolerance(-0.5)
            .build()
            .is_err());
    }

    #[test]
    fn builder_rejects_empty_custom_page() {
        let r = ConversionConfig::builder()
            .page_size(PageSize::Custom {
                width_pt: 0.0,
                height_pt: 100.0,
            })
            .build();
        assert!(r.is_err());
    }

    #[test]
    fn a4_matches_iso_points() {
        let (w, h) = PageSize::A4.dimensions_pt();
        assert!((w - 595.2756).abs() < 1e-3, "w = {w}");
        assert!((h - 841.8898).abs() < 1e-3, "h = {h}");
    }

    #[test]
    fn page_size_parsing() {
        assert_eq!("A4".parse::<PageSize>().unwrap(), PageSize::A4);
        assert_eq!(" letter ".parse::<PageSize>().unwrap(), PageSize::Letter);
        assert_eq!(
            "200x100".parse::<PageSize>().unwrap(),
            PageSize::Custom {
                width_pt: 200.0,
                height_pt: 100.0
            }
        );
        assert!("b5".parse::<PageSize>().is_err());
        assert!("axb".parse::<PageSize>().is_err());
    }

    #[test]
    fn geometry_carries_dpi() {
        let c = ConversionConfig::builder()
            .page_size(PageSize::Letter)
            .dpi(150.0)
            .build()
            .unwrap();
        let g = c.page_geometry();
        assert_eq!(g.width_pt, 612.0);
        assert_eq!(g.height_pt, 792.0);
        assert_eq!(g.dpi, 150.0);
    }
}
