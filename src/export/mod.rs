//! # Export
//!
//! Turns rendered output into bytes:
//!
//! | Function | Output |
//! |----------|--------|
//! | [`pages_to_pdf`] | multi-page PDF, one full-page image per page |
//! | [`MarkupRenderer::render`] | filled template markup → bitmap |
//! | [`build_archive`] | deflated ZIP of per-record files |
//!
//! Nothing here touches the filesystem.

pub mod archive;
pub mod pdf;
pub mod svg;

pub use archive::{build_archive, entry_name, sanitize_field};
pub use pdf::pages_to_pdf;
pub use svg::{MarkupRenderer, ResvgRenderer};

use image::{DynamicImage, ImageEncoder, RgbImage};

use crate::config::OutputFormat;
use crate::error::{EtiquetteError, Result};

/// Encode one rendered template instance in the requested format.
pub fn encode_artifact(img: RgbImage, format: OutputFormat, dpi: u32) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Png => {
            let mut png_bytes = Vec::new();
            image::codecs::png::PngEncoder::new(&mut png_bytes)
                .write_image(
                    img.as_raw(),
                    img.width(),
                    img.height(),
                    image::ExtendedColorType::Rgb8,
                )
                .map_err(|e: image::ImageError| EtiquetteError::Image(e.to_string()))?;
            Ok(png_bytes)
        }
        OutputFormat::Pdf => pages_to_pdf(&[DynamicImage::ImageRgb8(img)], dpi),
    }
}
