//! # Raster Path
//!
//! Draws label cells as grayscale bitmaps and composes them onto pages.
//!
//! ```text
//! LabelRecord ──LabelPainter──► cell bitmap ──compose_pages──► page bitmaps ──► PDF / PNG
//! ```

pub mod font;
pub mod label;

pub use font::{FontCache, Weight};
pub use label::LabelPainter;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageEncoder, Luma};

use crate::error::{EtiquetteError, Result};
use crate::layout::{LayoutSpec, paginate};

/// Scale factor of the preview image relative to the printed page.
pub const PREVIEW_SCALE: f64 = 0.35;

/// A label bitmap or a hole left by a record that failed to render.
pub type Cell = Option<GrayImage>;

/// Paste cells onto white pages in layout order.
///
/// Always returns at least one page. `None` cells keep their grid position
/// blank.
pub fn compose_pages(cells: &[Cell], layout: &LayoutSpec) -> Result<Vec<GrayImage>> {
    let width = layout.page_w_px().max(1);
    let height = layout.page_h_px().max(1);

    let pages = paginate(cells.len(), layout)?
        .into_iter()
        .map(|plan| {
            let mut page = GrayImage::from_pixel(width, height, Luma([255u8]));
            for cell in &plan.cells {
                if let Some(Some(label)) = cells.get(cell.index) {
                    imageops::replace(&mut page, label, cell.x as i64, cell.y as i64);
                }
            }
            page
        })
        .collect();
    Ok(pages)
}

/// Encode a grayscale bitmap as PNG.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .map_err(|e: image::ImageError| EtiquetteError::Image(e.to_string()))?;
    Ok(png_bytes)
}

/// Reduced copy of a page for on-screen preview.
pub fn downscale(img: &GrayImage, factor: f64) -> GrayImage {
    let width = ((img.width() as f64 * factor).round() as u32).max(1);
    let height = ((img.height() as f64 * factor).round() as u32).max(1);
    imageops::resize(img, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn small_layout() -> LayoutSpec {
        LayoutSpec {
            label_width_mm: 10.0,
            label_height_mm: 10.0,
            page_width_mm: 30.0,
            page_height_mm: 30.0,
            margin_mm: 2.0,
            gutter_mm: 2.0,
            cols: 2,
            rows: 2,
            dpi: 254,
        }
    }

    fn black_cell(layout: &LayoutSpec) -> Cell {
        Some(GrayImage::from_pixel(
            layout.label_w_px(),
            layout.label_h_px(),
            Luma([0u8]),
        ))
    }

    #[test]
    fn test_compose_places_cells() {
        let layout = small_layout();
        // 10 px/mm: label 100, margin 20, gutter 20, page 300
        let pages = compose_pages(&[black_cell(&layout), black_cell(&layout)], &layout).unwrap();
        assert_eq!(pages.len(), 1);
        let page = &pages[0];
        assert_eq!((page.width(), page.height()), (300, 300));
        assert_eq!(page.get_pixel(20, 20).0[0], 0);
        assert_eq!(page.get_pixel(19, 20).0[0], 255);
        assert_eq!(page.get_pixel(140, 20).0[0], 0);
        assert_eq!(page.get_pixel(130, 20).0[0], 255);
        // Second row stays empty
        assert_eq!(page.get_pixel(20, 140).0[0], 255);
    }

    #[test]
    fn test_compose_overflows_to_new_page() {
        let layout = small_layout();
        let cells: Vec<Cell> = (0..5).map(|_| black_cell(&layout)).collect();
        let pages = compose_pages(&cells, &layout).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].get_pixel(20, 20).0[0], 0);
        assert_eq!(pages[1].get_pixel(140, 20).0[0], 255);
    }

    #[test]
    fn test_failed_cell_leaves_blank_slot() {
        let layout = small_layout();
        let pages = compose_pages(&[None, black_cell(&layout)], &layout).unwrap();
        assert_eq!(pages[0].get_pixel(20, 20).0[0], 255);
        assert_eq!(pages[0].get_pixel(140, 20).0[0], 0);
    }

    #[test]
    fn test_empty_batch_one_blank_page() {
        let pages = compose_pages(&[], &small_layout()).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_encode_png_signature() {
        let png = encode_png(&GrayImage::from_pixel(4, 4, Luma([255u8]))).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_downscale() {
        let img = GrayImage::from_pixel(2480, 3508, Luma([255u8]));
        let small = downscale(&img, PREVIEW_SCALE);
        assert_eq!((small.width(), small.height()), (868, 1228));
    }
}
