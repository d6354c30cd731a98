//! Vector markup rasterization.

use std::sync::Arc;

use image::{Rgb, RgbImage};
use resvg::{tiny_skia, usvg};
use tracing::debug;

use crate::error::{EtiquetteError, Result};

/// CSS reference resolution used by SVG user units.
pub const SVG_USER_DPI: f32 = 96.0;

/// Black-box renderer turning markup into pixels.
pub trait MarkupRenderer: Send + Sync {
    /// Rasterize `markup` at `dpi`, flattened onto white.
    fn render(&self, markup: &str, dpi: u32) -> Result<RgbImage>;
}

/// resvg-backed renderer with a shared font database.
pub struct ResvgRenderer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl ResvgRenderer {
    /// Renderer with system fonts loaded.
    pub fn new() -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        debug!(faces = db.len(), "loaded system fonts for markup rendering");
        Self {
            fontdb: Arc::new(db),
        }
    }
}

impl Default for ResvgRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupRenderer for ResvgRenderer {
    fn render(&self, markup: &str, dpi: u32) -> Result<RgbImage> {
        let mut options = usvg::Options::default();
        options.fontdb = Arc::clone(&self.fontdb);

        let tree = usvg::Tree::from_str(markup, &options)
            .map_err(|e| EtiquetteError::Render(format!("invalid markup: {}", e)))?;

        let zoom = dpi as f32 / SVG_USER_DPI;
        let size = tree.size();
        let width = ((size.width() * zoom).ceil() as u32).max(1);
        let height = ((size.height() * zoom).ceil() as u32).max(1);

        let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
            EtiquetteError::Render(format!("cannot allocate {}×{} canvas", width, height))
        })?;
        pixmap.fill(tiny_skia::Color::WHITE);
        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(zoom, zoom),
            &mut pixmap.as_mut(),
        );

        // Opaque background, so premultiplied channels are the final colors
        let data = pixmap.data();
        let rgb = RgbImage::from_fn(width, height, |x, y| {
            let idx = ((y * width + x) * 4) as usize;
            Rgb([data[idx], data[idx + 1], data[idx + 2]])
        });
        Ok(rgb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_mm_sized_document() {
        let renderer = ResvgRenderer {
            fontdb: Arc::new(usvg::fontdb::Database::new()),
        };
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="25.4mm" height="12.7mm"><rect x="0" y="0" width="10" height="10" fill="#000"/></svg>"##;
        let img = renderer.render(svg, 300).unwrap();
        assert_eq!((img.width(), img.height()), (300, 150));
        assert_eq!(img.get_pixel(5, 5).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(200, 100).0, [255, 255, 255]);
    }

    #[test]
    fn test_invalid_markup() {
        let renderer = ResvgRenderer {
            fontdb: Arc::new(usvg::fontdb::Database::new()),
        };
        assert!(matches!(
            renderer.render("<svg", 300),
            Err(EtiquetteError::Render(_))
        ));
    }
}
