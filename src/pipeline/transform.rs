//! Transformer: one image + page geometry → JPEG payload or per-image error.
//!
//! ## Decision table
//!
//! | resize needed? | source JPEG with 1/3 components? | action                      |
//! |----------------|----------------------------------|-----------------------------|
//! | no             | yes                              | passthrough (bytes as-is)   |
//! | no             | no                               | decode → flatten → JPEG     |
//! | yes            | either                           | decode → Lanczos3 → JPEG    |
//!
//! Passthrough never decodes pixels: dimensions, DPI and component count all
//! come from the header. Every failure is returned as a
//! [`TransformResult::Failure`] for this image only; nothing here panics on
//! bad input and no shared state is written.

use crate::config::{ConversionConfig, PageGeometry, MAX_DPI, MIN_DPI, POINTS_PER_INCH};
use crate::error::ItemError;
use crate::output::{FailedImage, ImageTask, SourceFormat, TransformResult, TransformedImage};
use crate::pipeline::metadata;
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbImage};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

/// Largest resize target accepted for one image (A3 at 1200 dpi fits).
pub const MAX_TARGET_PIXELS: u64 = 300_000_000;

/// Target pixel size and physical size for one image on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitTransform {
    pub target_width: u32,
    pub target_height: u32,
    /// DPI the targets were computed at.
    pub dpi: f64,
}

impl FitTransform {
    /// Largest aspect-preserving fit of `img_w × img_h` inside the page.
    ///
    /// The constraining axis fills the page exactly; the other axis is
    /// scaled by the same factor. Both targets are at least 1 px.
    pub fn compute(img_w: u32, img_h: u32, page: &PageGeometry, dpi: f64) -> Self {
        let (iw, ih) = (img_w.max(1) as f64, img_h.max(1) as f64);
        let width_ratio = page.width_pt / iw;
        let height_ratio = page.height_pt / ih;
        let px = |pt: f64| -> u32 { (pt * dpi / POINTS_PER_INCH).round().max(1.0) as u32 };

        let (target_width, target_height) = if width_ratio < height_ratio {
            (px(page.width_pt), px(ih * width_ratio))
        } else {
            (px(iw * height_ratio), px(page.height_pt))
        };
        Self {
            target_width,
            target_height,
            dpi,
        }
    }

    pub fn width_pt(&self) -> f64 {
        self.target_width as f64 * POINTS_PER_INCH / self.dpi
    }

    pub fn height_pt(&self) -> f64 {
        self.target_height as f64 * POINTS_PER_INCH / self.dpi
    }

    pub fn pixel_count(&self) -> u64 {
        self.target_width as u64 * self.target_height as u64
    }
}

/// Whether either axis differs from its target by more than `tolerance`
/// (relative to the target).
pub fn needs_resize(current: (u32, u32), target: (u32, u32), tolerance: f64) -> bool {
    let off = |cur: u32, tgt: u32| {
        let tgt = tgt.max(1) as f64;
        (cur as f64 - tgt).abs() / tgt > tolerance
    };
    off(current.0, target.0) || off(current.1, target.1)
}

/// Per-run transformer; cheap to clone into every worker.
#[derive(Debug, Clone)]
pub struct Transformer {
    page: PageGeometry,
    quality: u8,
    tolerance: f64,
}

impl Transformer {
    pub fn new(page: PageGeometry, quality: u8, tolerance: f64) -> Self {
        Self {
            page,
            quality: quality.clamp(1, 100),
            tolerance,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self::new(
            config.page_geometry(),
            config.jpeg_quality,
            config.resize_tolerance,
        )
    }

    /// Read and transform one task. Produces exactly one result.
    pub fn transform(&self, task: &ImageTask) -> TransformResult {
        match std::fs::read(&task.path) {
            Ok(bytes) => self.transform_bytes(task.index, &task.path, bytes),
            Err(e) => TransformResult::Failure(FailedImage::new(
                task.index,
                ItemError::SourceRead {
                    path: task.path.clone(),
                    detail: e.to_string(),
                },
            )),
        }
    }

    /// Transform an image already held in memory.
    pub fn transform_bytes(&self, index: usize, path: &Path, bytes: Vec<u8>) -> TransformResult {
        match self.try_transform(index, path, bytes) {
            Ok(t) => TransformResult::Success(t),
            Err(error) => TransformResult::Failure(FailedImage::new(index, error)),
        }
    }

    fn try_transform(
        &self,
        index: usize,
        path: &Path,
        bytes: Vec<u8>,
    ) -> Result<TransformedImage, ItemError> {
        let format = SourceFormat::sniff(&bytes).ok_or_else(|| ItemError::Unsupported {
            path: path.to_path_buf(),
            detail: "unrecognised file signature (expected PNG, JPEG or WebP)".into(),
        })?;

        let (img_w, img_h) = image::ImageReader::with_format(Cursor::new(&bytes), format.image_format())
            .into_dimensions()
            .map_err(|e| decode_error(path, e))?;
        if img_w == 0 || img_h == 0 {
            return Err(ItemError::Decode {
                path: path.to_path_buf(),
                detail: format!("empty image ({img_w}×{img_h})"),
            });
        }

        let dpi = match metadata::read_dpi(&bytes, format) {
            Some(declared) if !(MIN_DPI..=MAX_DPI).contains(&declared) => {
                warn!(
                    index,
                    path = %path.display(),
                    "header density {declared:.0} dpi out of range, clamped"
                );
                declared.clamp(MIN_DPI, MAX_DPI)
            }
            Some(declared) => declared,
            None => self.page.dpi,
        };
        let fit = FitTransform::compute(img_w, img_h, &self.page, dpi);
        let resize = needs_resize(
            (img_w, img_h),
            (fit.target_width, fit.target_height),
            self.tolerance,
        );

        let passthrough = !resize
            && format == SourceFormat::Jpeg
            && matches!(metadata::jpeg_components(&bytes), Some(1 | 3));

        if passthrough {
            debug!(index, path = %path.display(), "passthrough {img_w}×{img_h} @ {dpi} dpi");
            return Ok(TransformedImage {
                index,
                path: path.to_path_buf(),
                payload: bytes,
                width_pt: fit.width_pt(),
                height_pt: fit.height_pt(),
                pixel_width: img_w,
                pixel_height: img_h,
                was_converted: false,
                source_format: format,
            });
        }

        if resize && fit.pixel_count() > MAX_TARGET_PIXELS {
            return Err(ItemError::Transform {
                path: path.to_path_buf(),
                detail: format!(
                    "target {}×{} px at {dpi} dpi exceeds the {MAX_TARGET_PIXELS} pixel limit",
                    fit.target_width, fit.target_height
                ),
            });
        }

        let mut img = image::load_from_memory_with_format(&bytes, format.image_format())
            .map_err(|e| decode_error(path, e))?;
        drop(bytes);

        if resize {
            debug!(
                index,
                path = %path.display(),
                "resize {img_w}×{img_h} → {}×{}",
                fit.target_width,
                fit.target_height
            );
            img = img.resize_exact(fit.target_width, fit.target_height, FilterType::Lanczos3);
        }

        let payload = encode_jpeg(&img, self.quality, dpi).map_err(|e| ItemError::Transform {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        Ok(TransformedImage {
            index,
            path: path.to_path_buf(),
            payload,
            width_pt: fit.width_pt(),
            height_pt: fit.height_pt(),
            pixel_width: img.width(),
            pixel_height: img.height(),
            was_converted: true,
            source_format: format,
        })
    }
}

fn decode_error(path: &Path, e: image::ImageError) -> ItemError {
    match e {
        image::ImageError::Unsupported(u) => ItemError::Unsupported {
            path: path.to_path_buf(),
            detail: u.to_string(),
        },
        other => ItemError::Decode {
            path: path.to_path_buf(),
            detail: other.to_string(),
        },
    }
}

/// Encode as baseline JPEG. Opaque grey stays single-channel; everything
/// else becomes RGB with alpha composited onto white.
fn encode_jpeg(img: &DynamicImage, quality: u8, dpi: f64) -> image::ImageResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder.set_pixel_density(PixelDensity::dpi(dpi.round().clamp(1.0, u16::MAX as f64) as u16));

    let color = img.color();
    if !color.has_alpha() && color.channel_count() == 1 {
        let gray = img.to_luma8();
        encoder.write_image(gray.as_raw(), gray.width(), gray.height(), ExtendedColorType::L8)?;
    } else {
        let rgb = if color.has_alpha() {
            flatten_onto_white(img)
        } else {
            img.to_rgb8()
        };
        encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
    }
    Ok(out)
}

/// Composite over an opaque white background.
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
        let a = src[3] as u32;
        for c in 0..3 {
            dst[c] = ((src[c] as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        }
    }
    out
}
