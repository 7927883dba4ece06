//! Compositor: place transformed images into a PDF, one centred image per page.
//!
//! Runs strictly sequentially in index order. Each payload is a JPEG stream
//! embedded verbatim as a `/DCTDecode` image XObject, so passthrough bytes
//! reach the file unchanged. A payload that cannot be placed is recorded as
//! an [`ItemError::Placement`] and the run continues with the next page.
//!
//! ```text
//! Page ─ MediaBox [0 0 pw ph]
//!      ├ Resources /XObject /Im0 ─▶ Image (DCTDecode, DeviceGray|DeviceRGB)
//!      └ Contents  q w 0 0 h x y cm /Im0 Do Q
//! ```

use crate::config::PageGeometry;
use crate::error::{Img2PdfError, ItemError};
use crate::output::{FailedImage, TransformedImage};
use crate::pipeline::metadata;
use image::codecs::jpeg::JpegDecoder;
use image::ImageDecoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Cursor;
use tracing::{debug, warn};

const PRODUCER: &str = concat!("edgequake-img2pdf ", env!("CARGO_PKG_VERSION"));
const IMAGE_NAME: &[u8] = b"Im0";

/// Output of [`compose`].
#[derive(Debug)]
pub struct Composed {
    pub document: Vec<u8>,
    pub pages: usize,
    pub placement_failures: Vec<FailedImage>,
}

/// Place `successes` (ascending by index) and serialise the document.
pub fn compose(
    successes: Vec<TransformedImage>,
    page: PageGeometry,
    title: Option<&str>,
) -> Result<Composed, Img2PdfError> {
    let mut compositor = Compositor::new(page);
    let mut placement_failures = Vec::new();
    for image in successes {
        let index = image.index;
        if let Err(error) = compositor.place(image) {
            warn!("Skipping page for image {}: {}", index, error);
            placement_failures.push(FailedImage::new(index, error));
        }
    }
    let pages = compositor.page_count();
    let document = compositor.finish(title)?;
    Ok(Composed {
        document,
        pages,
        placement_failures,
    })
}

/// Incremental page writer over a [`lopdf::Document`].
pub struct Compositor {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    page: PageGeometry,
}

impl Compositor {
    pub fn new(page: PageGeometry) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            page,
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append one page holding `image`, centred. Consumes the payload.
    pub fn place(&mut self, image: TransformedImage) -> Result<(), ItemError> {
        let placement = |detail: String| ItemError::Placement {
            path: image.path.clone(),
            detail,
        };

        let color_space: &[u8] = match metadata::jpeg_components(&image.payload) {
            Some(1) => b"DeviceGray",
            Some(3) => b"DeviceRGB",
            Some(n) => return Err(placement(format!("unsupported JPEG component count {n}"))),
            None => return Err(placement("payload has no JPEG frame header".into())),
        };
        let (px_w, px_h) = JpegDecoder::new(Cursor::new(image.payload.as_slice()))
            .map(|d| d.dimensions())
            .map_err(|e| placement(format!("invalid JPEG header: {e}")))?;

        let (w, h) = (image.width_pt, image.height_pt);
        let x = (self.page.width_pt - w) / 2.0;
        let y = (self.page.height_pt - h) / 2.0;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        real(w),
                        Object::Integer(0),
                        Object::Integer(0),
                        real(h),
                        real(x),
                        real(y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.to_vec())]),
                Operation::new("Q", vec![]),
            ],
        }
        .encode()
        .map_err(|e| placement(format!("content stream: {e}")))?;

        let path = image.path.clone();
        let image_dict = dictionary! {
            "Type" => Object::Name(b"XObject".to_vec()),
            "Subtype" => Object::Name(b"Image".to_vec()),
            "Width" => Object::Integer(px_w as i64),
            "Height" => Object::Integer(px_h as i64),
            "ColorSpace" => Object::Name(color_space.to_vec()),
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => Object::Name(b"DCTDecode".to_vec()),
        };
        let image_id = self
            .doc
            .add_object(Stream::new(image_dict, image.payload).with_compression(false));
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let mut xobjects = Dictionary::new();
        xobjects.set(IMAGE_NAME, Object::Reference(image_id));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => Object::Name(b"Page".to_vec()),
            "Parent" => Object::Reference(self.pages_id),
            "MediaBox" => Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                real(self.page.width_pt),
                real(self.page.height_pt),
            ]),
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! { "XObject" => xobjects },
        });
        self.kids.push(Object::Reference(page_id));

        debug!(
            page = self.kids.len(),
            path = %path.display(),
            "placed {}×{} px at ({:.1}, {:.1}) size {:.1}×{:.1} pt",
            px_w, px_h, x, y, w, h
        );
        Ok(())
    }

    /// Write the page tree, catalog and `/Info`, then serialise.
    pub fn finish(mut self, title: Option<&str>) -> Result<Vec<u8>, Img2PdfError> {
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Kids" => Object::Array(self.kids),
            "Count" => Object::Integer(count),
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => Object::Name(b"Catalog".to_vec()),
            "Pages" => Object::Reference(self.pages_id),
        });
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut info = dictionary! {
            "Producer" => Object::string_literal(PRODUCER),
        };
        if let Some(title) = title {
            info.set("Title", Object::string_literal(title));
        }
        let info_id = self.doc.add_object(info);
        self.doc.trailer.set("Info", Object::Reference(info_id));

        self.doc.compress();

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| Img2PdfError::DocumentFailed(e.to_string()))?;
        Ok(out)
    }
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SourceFormat;
    use image::codecs::jpeg::JpegEncoder;
    use image::{ExtendedColorType, ImageEncoder};
    use std::path::PathBuf;

    fn page() -> PageGeometry {
        PageGeometry {
            width_pt: 200.0,
            height_pt: 100.0,
            dpi: 72.0,
        }
    }

    fn jpeg(w: u32, h: u32, color: ExtendedColorType) -> Vec<u8> {
        let channels = if color == ExtendedColorType::L8 { 1 } else { 3 };
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 85)
            .write_image(&vec![120u8; (w * h) as usize * channels], w, h, color)
            .unwrap();
        out
    }

    fn transformed(index: usize, payload: Vec<u8>, w_pt: f64, h_pt: f64) -> TransformedImage {
        TransformedImage {
            index,
            path: PathBuf::from(format!("{index}.jpg")),
            payload,
            width_pt: w_pt,
            height_pt: h_pt,
            pixel_width: 0,
            pixel_height: 0,
            was_converted: true,
            source_format: SourceFormat::Jpeg,
        }
    }

    fn image_stream(doc: &Document, page_id: ObjectId) -> Stream {
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
        doc.get_object(id).unwrap().as_stream().unwrap().clone()
    }

    #[test]
    fn pages_follow_input_order() {
        let images = vec![
            transformed(0, jpeg(10, 5, ExtendedColorType::Rgb8), 200.0, 100.0),
            transformed(1, jpeg(20, 5, ExtendedColorType::Rgb8), 200.0, 50.0),
            transformed(2, jpeg(30, 5, ExtendedColorType::L8), 100.0, 100.0),
        ];
        let out = compose(images, page(), Some("Scans")).unwrap();
        assert_eq!(out.pages, 3);
        assert!(out.placement_failures.is_empty());

        let doc = Document::load_mem(&out.document).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);
        let widths: Vec<i64> = pages
            .values()
            .map(|id| image_stream(&doc, *id).dict.get(b"Width").unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(widths, vec![10, 20, 30]);

        let third = image_stream(&doc, pages[&3]);
        assert_eq!(
            third.dict.get(b"ColorSpace").unwrap().as_name().unwrap(),
            b"DeviceGray"
        );
    }

    #[test]
    fn payload_is_embedded_verbatim() {
        let payload = jpeg(16, 8, ExtendedColorType::Rgb8);
        let out = compose(
            vec![transformed(0, payload.clone(), 200.0, 100.0)],
            page(),
            None,
        )
        .unwrap();
        let doc = Document::load_mem(&out.document).unwrap();
        let (_, id) = doc.get_pages().into_iter().next().unwrap();
        let stream = image_stream(&doc, id);
        assert_eq!(stream.content, payload);
        assert_eq!(
            stream.dict.get(b"Filter").unwrap().as_name().unwrap(),
            b"DCTDecode"
        );
    }

    #[test]
    fn image_is_centred() {
        let out = compose(
            vec![transformed(0, jpeg(4, 4, ExtendedColorType::Rgb8), 100.0, 100.0)],
            page(),
            None,
        )
        .unwrap();
        let doc = Document::load_mem(&out.document).unwrap();
        let (_, id) = doc.get_pages().into_iter().next().unwrap();
        let content = Content::decode(&doc.get_page_content(id).unwrap()).unwrap();
        let cm = content
            .operations
            .iter()
            .find(|op| op.operator == "cm")
            .unwrap();
        let nums: Vec<f32> = cm.operands.iter().map(|o| o.as_float().unwrap()).collect();
        assert_eq!(nums, vec![100.0, 0.0, 0.0, 100.0, 50.0, 0.0]);
    }

    #[test]
    fn bad_payload_is_placement_failure() {
        let images = vec![
            transformed(0, jpeg(4, 4, ExtendedColorType::Rgb8), 10.0, 10.0),
            transformed(1, b"\xFF\xD8\xFFgarbage".to_vec(), 10.0, 10.0),
            transformed(2, jpeg(4, 4, ExtendedColorType::Rgb8), 10.0, 10.0),
        ];
        let out = compose(images, page(), None).unwrap();
        assert_eq!(out.pages, 2);
        assert_eq!(out.placement_failures.len(), 1);
        assert_eq!(out.placement_failures[0].index, 1);
        assert_eq!(out.placement_failures[0].error.stage(), "placement");
        assert_eq!(Document::load_mem(&out.document).unwrap().get_pages().len(), 2);
    }

    #[test]
    fn info_carries_title_and_producer() {
        let out = compose(
            vec![transformed(0, jpeg(4, 4, ExtendedColorType::Rgb8), 10.0, 10.0)],
            page(),
            Some("Holiday"),
        )
        .unwrap();
        let doc = Document::load_mem(&out.document).unwrap();
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info_id).unwrap();
        assert_eq!(info.get(b"Title").unwrap().as_str().unwrap(), b"Holiday");
        assert!(info
            .get(b"Producer")
            .unwrap()
            .as_str()
            .unwrap()
            .starts_with(b"edgequake-img2pdf"));
    }
}
