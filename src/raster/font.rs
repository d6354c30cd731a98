//! Font loading and text drawing for raster labels.
//!
//! TrueType faces are rendered anti-aliased with ab_glyph. When no face can
//! be loaded, text falls back to the Spleen 12×24 bitmap font scaled to the
//! requested pixel height, so labels always render.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ab_glyph::{Font, FontArc, ScaleFont};
use image::{GrayImage, Luma};
use spleen_font::{FONT_12X24, PSF2Font};
use tracing::{debug, warn};

use crate::config::FontConfig;

const SYSTEM_REGULAR: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/DejaVuSans.ttf",
];

const SYSTEM_BOLD: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/Library/Fonts/DejaVuSans-Bold.ttf",
];

const BITMAP_W: u32 = 12;
const BITMAP_H: u32 = 24;

/// Text weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weight {
    Regular,
    Bold,
}

/// Lazily loaded faces for one batch.
///
/// Each face is loaded at most once, on first use.
pub struct FontCache {
    config: FontConfig,
    regular: OnceLock<Option<FontArc>>,
    bold: OnceLock<Option<FontArc>>,
}

fn load_face(path: &Path) -> Option<FontArc> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "font not readable");
            return None;
        }
    };
    match FontArc::try_from_vec(bytes) {
        Ok(font) => {
            debug!(path = %path.display(), "loaded font");
            Some(font)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "invalid font file");
            None
        }
    }
}

fn resolve_face(explicit: Option<&PathBuf>, search: bool, candidates: &[&str]) -> Option<FontArc> {
    if let Some(path) = explicit {
        if let Some(font) = load_face(path) {
            return Some(font);
        }
        warn!(path = %path.display(), "configured font unavailable, trying fallbacks");
    }
    if search {
        return candidates.iter().find_map(|p| {
            let path = Path::new(p);
            if path.exists() { load_face(path) } else { None }
        });
    }
    None
}

impl FontCache {
    pub fn new(config: FontConfig) -> Self {
        Self {
            config,
            regular: OnceLock::new(),
            bold: OnceLock::new(),
        }
    }

    /// Cache that never loads TrueType faces.
    pub fn bitmap_only() -> Self {
        Self::new(FontConfig::bitmap_only())
    }

    fn face(&self, weight: Weight) -> Option<&FontArc> {
        let config = &self.config;
        match weight {
            Weight::Regular => self
                .regular
                .get_or_init(|| {
                    resolve_face(config.regular.as_ref(), config.search_system, SYSTEM_REGULAR)
                })
                .as_ref(),
            Weight::Bold => self
                .bold
                .get_or_init(|| {
                    resolve_face(config.bold.as_ref(), config.search_system, SYSTEM_BOLD)
                })
                // No bold face: use the regular one
                .as_ref()
                .or_else(|| self.face(Weight::Regular)),
        }
    }

    /// True when at least the regular TrueType face is available.
    pub fn has_truetype(&self) -> bool {
        self.face(Weight::Regular).is_some()
    }

    /// Advance width of `text` in pixels.
    pub fn measure(&self, text: &str, px: f32, weight: Weight) -> u32 {
        match self.face(weight) {
            Some(font) => {
                let scaled = font.as_scaled(px);
                let width: f32 = text.chars().map(|ch| scaled.h_advance(font.glyph_id(ch))).sum();
                width.ceil() as u32
            }
            None => {
                let scale = bitmap_scale(px);
                text.chars().count() as u32 * BITMAP_W * scale
                    + if weight == Weight::Bold && !text.is_empty() { 1 } else { 0 }
            }
        }
    }

    /// Line height for `px` in pixels.
    pub fn line_height(&self, px: f32, weight: Weight) -> u32 {
        match self.face(weight) {
            Some(font) => {
                let scaled = font.as_scaled(px);
                (scaled.ascent() - scaled.descent()).ceil() as u32
            }
            None => BITMAP_H * bitmap_scale(px),
        }
    }

    /// Draw black `text` with its top-left corner at (`x`, `y`).
    ///
    /// Pixels outside the image are clipped.
    pub fn draw(&self, img: &mut GrayImage, x: i32, y: i32, text: &str, px: f32, weight: Weight) {
        match self.face(weight) {
            Some(font) => draw_truetype(img, font, x, y, text, px),
            None => {
                draw_bitmap(img, x, y, text, px);
                if weight == Weight::Bold {
                    draw_bitmap(img, x + 1, y, text, px);
                }
            }
        }
    }
}

/// Integer upscale factor for the bitmap font; never below 1.
fn bitmap_scale(px: f32) -> u32 {
    ((px / BITMAP_H as f32).round() as u32).max(1)
}

/// Darken a pixel by `coverage` (0.0 = untouched, 1.0 = black).
fn ink(img: &mut GrayImage, x: i32, y: i32, coverage: f32) {
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
        return;
    }
    let pixel = img.get_pixel_mut(x as u32, y as u32);
    let current = pixel.0[0] as f32;
    let next = current * (1.0 - coverage.clamp(0.0, 1.0));
    *pixel = Luma([next.round() as u8]);
}

fn draw_truetype(img: &mut GrayImage, font: &FontArc, x: i32, y: i32, text: &str, px: f32) {
    let scaled = font.as_scaled(px);
    let baseline = y as f32 + scaled.ascent();
    let mut caret = x as f32;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        let glyph = glyph_id.with_scale_and_position(px, ab_glyph::point(caret, baseline));
        caret += scaled.h_advance(glyph_id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                ink(
                    img,
                    gx as i32 + bounds.min.x as i32,
                    gy as i32 + bounds.min.y as i32,
                    coverage,
                );
            });
        }
    }
}

fn draw_bitmap(img: &mut GrayImage, x: i32, y: i32, text: &str, px: f32) {
    let Ok(mut spleen) = PSF2Font::new(FONT_12X24) else {
        return;
    };
    let scale = bitmap_scale(px) as i32;
    let mut caret = x;

    for ch in text.chars() {
        let mut buf = [0u8; 4];
        let utf8 = ch.encode_utf8(&mut buf);
        if let Some(glyph) = spleen.glyph_for_utf8(utf8.as_bytes()) {
            for (row_y, row) in glyph.enumerate() {
                for (col_x, on) in row.enumerate() {
                    if !on {
                        continue;
                    }
                    let gx = caret + col_x as i32 * scale;
                    let gy = y + row_y as i32 * scale;
                    for dy in 0..scale {
                        for dx in 0..scale {
                            ink(img, gx + dx, gy + dy, 1.0);
                        }
                    }
                }
            }
        }
        caret += BITMAP_W as i32 * scale;
    }
}
