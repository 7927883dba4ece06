//! Header-only metadata: pixel density and JPEG component count.
//!
//! These are read straight from the container without decoding pixels, so
//! the passthrough path never pays for a decode.
//!
//! | Format | DPI source                                   |
//! |--------|----------------------------------------------|
//! | PNG    | `pHYs` chunk, unit = metre                   |
//! | JPEG   | JFIF `APP0`, units = dots/inch or dots/cm    |
//! | WebP   | none (always falls back to the run DPI)      |

use crate::output::SourceFormat;

const INCHES_PER_METRE: f64 = 39.370_078_740_157_48;
const CM_PER_INCH: f64 = 2.54;

/// Horizontal DPI declared in the image header, if any.
///
/// Zero or non-finite densities count as absent.
pub fn read_dpi(bytes: &[u8], format: SourceFormat) -> Option<f64> {
    let dpi = match format {
        SourceFormat::Png => png_dpi(bytes),
        SourceFormat::Jpeg => jfif_dpi(bytes),
        SourceFormat::WebP => None,
    }?;
    (dpi.is_finite() && dpi > 0.0).then_some(dpi)
}

/// Number of colour components in the first JPEG frame header.
///
/// `None` when no SOF segment precedes the scan data.
pub fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    JpegSegments::new(bytes).find_map(|(marker, data)| {
        if is_sof(marker) && data.len() >= 6 {
            Some(data[5])
        } else {
            None
        }
    })
}

fn png_dpi(bytes: &[u8]) -> Option<f64> {
    let mut pos = 8;
    while pos + 8 <= bytes.len() {
        let len = u32::from_be_bytes(bytes[pos..pos + 4].try_into().ok()?) as usize;
        let kind = &bytes[pos + 4..pos + 8];
        let data_start = pos + 8;
        let data_end = data_start.checked_add(len)?;
        if kind == b"IDAT" || kind == b"IEND" {
            return None;
        }
        if kind == b"pHYs" {
            let data = bytes.get(data_start..data_end)?;
            if data.len() < 9 || data[8] != 1 {
                return None;
            }
            let ppm = u32::from_be_bytes(data[0..4].try_into().ok()?);
            return Some(ppm as f64 / INCHES_PER_METRE);
        }
        // data + CRC
        pos = data_end.checked_add(4)?;
    }
    None
}

fn jfif_dpi(bytes: &[u8]) -> Option<f64> {
    JpegSegments::new(bytes).find_map(|(marker, data)| {
        if marker != 0xE0 || data.len() < 12 || &data[0..5] != b"JFIF\0" {
            return None;
        }
        let x = u16::from_be_bytes([data[8], data[9]]) as f64;
        match data[7] {
            1 => Some(x),
            2 => Some(x * CM_PER_INCH),
            // Aspect ratio only.
            _ => None,
        }
    })
}

/// SOF0–SOF15, excluding DHT (C4), JPG (C8) and DAC (CC).
fn is_sof(marker: u8) -> bool {
    (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

/// Iterates `(marker, payload)` over JPEG header segments, stopping at SOS.
struct JpegSegments<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> JpegSegments<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        let pos = if bytes.starts_with(&[0xFF, 0xD8]) {
            2
        } else {
            bytes.len()
        };
        Self { bytes, pos }
    }
}

impl<'a> Iterator for JpegSegments<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let b = self.bytes;
            if self.pos + 1 >= b.len() || b[self.pos] != 0xFF {
                return None;
            }
            let marker = b[self.pos + 1];
            match marker {
                // fill byte
                0xFF => {
                    self.pos += 1;
                    continue;
                }
                0x01 | 0xD0..=0xD7 => {
                    self.pos += 2;
                    continue;
                }
                0xD9 | 0xDA => {
                    self.pos = b.len();
                    return None;
                }
                _ => {}
            }
            let len_at = self.pos + 2;
            let len = u16::from_be_bytes([*b.get(len_at)?, *b.get(len_at + 1)?]) as usize;
            if len < 2 {
                return None;
            }
            let data = b.get(len_at + 2..len_at + len)?;
            self.pos = len_at + len;
            return Some((marker, data));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::{JpegEncoder, PixelDensity};
    use image::{ImageEncoder, RgbImage};

    fn png_with_phys(ppm: u32, unit: u8) -> Vec<u8> {
        let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
        let mut chunk = |kind: &[u8], data: &[u8]| {
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            out.extend_from_slice(kind);
            out.extend_from_slice(data);
            out.extend_from_slice(&[0, 0, 0, 0]);
        };
        chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 2, 0, 0, 0]);
        let mut phys = Vec::new();
        phys.extend_from_slice(&ppm.to_be_bytes());
        phys.extend_from_slice(&ppm.to_be_bytes());
        phys.push(unit);
        chunk(b"pHYs", &phys);
        chunk(b"IDAT", &[]);
        chunk(b"IEND", &[]);
        out
    }

    fn jpeg(density: PixelDensity, gray: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let mut enc = JpegEncoder::new_with_quality(&mut out, 90);
        enc.set_pixel_density(density);
        if gray {
            enc.write_image(&[128u8; 64], 8, 8, image::ExtendedColorType::L8)
                .unwrap();
        } else {
            let img = RgbImage::from_pixel(8, 8, image::Rgb([10, 20, 30]));
            enc.write_image(img.as_raw(), 8, 8, image::ExtendedColorType::Rgb8)
                .unwrap();
        }
        out
    }

    #[test]
    fn png_phys_metre_converts_to_dpi() {
        // 11811 px/m ≈ 300 dpi
        let dpi = read_dpi(&png_with_phys(11811, 1), SourceFormat::Png).unwrap();
        assert!((dpi - 300.0).abs() < 0.1, "dpi = {dpi}");
    }

    #[test]
    fn png_phys_unknown_unit_is_ignored() {
        assert_eq!(read_dpi(&png_with_phys(11811, 0), SourceFormat::Png), None);
    }

    #[test]
    fn png_zero_density_is_absent() {
        assert_eq!(read_dpi(&png_with_phys(0, 1), SourceFormat::Png), None);
    }

    #[test]
    fn jfif_inches_and_centimetres() {
        let dpi = read_dpi(&jpeg(PixelDensity::dpi(150), false), SourceFormat::Jpeg);
        assert_eq!(dpi, Some(150.0));

        let per_cm = PixelDensity {
            density: (100, 100),
            unit: image::codecs::jpeg::PixelDensityUnit::Centimeters,
        };
        let dpi = read_dpi(&jpeg(per_cm, false), SourceFormat::Jpeg).unwrap();
        assert!((dpi - 254.0).abs() < 1e-9);
    }

    #[test]
    fn jfif_aspect_ratio_only_is_absent() {
        let aspect = PixelDensity {
            density: (1, 1),
            unit: image::codecs::jpeg::PixelDensityUnit::PixelAspectRatio,
        };
        assert_eq!(read_dpi(&jpeg(aspect, false), SourceFormat::Jpeg), None);
    }

    #[test]
    fn webp_never_has_dpi() {
        assert_eq!(read_dpi(b"RIFF\0\0\0\0WEBP", SourceFormat::WebP), None);
    }

    #[test]
    fn component_count_from_sof() {
        assert_eq!(jpeg_components(&jpeg(PixelDensity::dpi(72), false)), Some(3));
        assert_eq!(jpeg_components(&jpeg(PixelDensity::dpi(72), true)), Some(1));
    }

    #[test]
    fn truncated_input_is_harmless() {
        let full = jpeg(PixelDensity::dpi(72), false);
        for cut in [0, 1, 2, 3, 5, 19] {
            let _ = jpeg_components(&full[..cut]);
            let _ = read_dpi(&full[..cut], SourceFormat::Jpeg);
        }
        let png = png_with_phys(2835, 1);
        for cut in [0, 8, 12, 30] {
            let _ = read_dpi(&png[..cut], SourceFormat::Png);
        }
        assert_eq!(jpeg_components(b"not a jpeg"), None);
    }
}
