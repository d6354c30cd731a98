//! Multi-page PDF from raster pages.
//!
//! Each page is a single full-bleed image XObject (Flate-compressed, 8 bits
//! per component) sized so that one pixel maps to `1/dpi` inch.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::{DynamicImage, GenericImageView};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use crate::error::{EtiquetteError, Result};

fn pdf_err(e: impl std::fmt::Display) -> EtiquetteError {
    EtiquetteError::Pdf(e.to_string())
}

fn deflate(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

/// Pixel data and PDF color space for a page image.
fn samples(page: &DynamicImage) -> (&'static str, Vec<u8>) {
    match page {
        DynamicImage::ImageLuma8(gray) => ("DeviceGray", gray.as_raw().clone()),
        other => ("DeviceRGB", other.to_rgb8().into_raw()),
    }
}

/// Build a PDF with one page per image, in order.
pub fn pages_to_pdf(pages: &[DynamicImage], dpi: u32) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(EtiquetteError::Pdf("document has no pages".to_string()));
    }
    let points_per_px = 72.0 / dpi.max(1) as f32;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        let (width, height) = page.dimensions();
        let (color_space, raw) = samples(page);

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8i64,
                "Filter" => "FlateDecode",
            },
            deflate(&raw)?,
        )
        .with_compression(false);
        let image_id = doc.add_object(image);

        let w_pt = width as f32 * points_per_px;
        let h_pt = height as f32 * points_per_px;
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(w_pt),
                        0i64.into(),
                        0i64.into(),
                        Object::Real(h_pt),
                        0i64.into(),
                        0i64.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().map_err(pdf_err)?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "MediaBox" => vec![
                0i64.into(),
                0i64.into(),
                Object::Real(w_pt),
                Object::Real(h_pt),
            ],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(pdf_err)?;
    Ok(out)
}
