//! Programmatic label cell drawing.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Style name (bold)                     Price  │
//! │ Color ref  |  Size                           │
//! │ Season / style ref                           │
//! │                                              │
//! │        ▌▌▐▐▌▌▐▌▐▌▐▌▌▐▐▌▌▐▌▌▌▐▐▌▐▌▐▌         │
//! │              3607186681381                   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Offsets are defined at 300 dpi and scaled linearly for other resolutions.

use image::imageops;
use image::{GrayImage, Luma};

use super::font::{FontCache, Weight};
use crate::barcode::{self, BarcodeEncoder};
use crate::config::BarcodeConfig;
use crate::error::Result;
use crate::layout::LayoutSpec;
use crate::record::{LabelRecord, format_price};

const REFERENCE_DPI: f32 = 300.0;

const LEFT: f32 = 16.0;
const TOP: f32 = 10.0;
const NAME_PX: f32 = 26.0;
const SECONDARY_Y: f32 = 42.0;
const SECONDARY_PX: f32 = 20.0;
const TERTIARY_Y: f32 = 68.0;
const TERTIARY_PX: f32 = 16.0;
const DIGITS_PX: f32 = 24.0;
const DIGITS_GAP: f32 = 4.0;

/// Everything needed to draw a label besides the record.
pub struct LabelPainter<'a> {
    pub layout: &'a LayoutSpec,
    pub barcode: &'a BarcodeConfig,
    pub fonts: &'a FontCache,
    pub encoder: &'a dyn BarcodeEncoder,
    /// Print prices with a decimal dot.
    pub dot_decimal_price: bool,
}

impl LabelPainter<'_> {
    fn scale(&self) -> f32 {
        self.layout.dpi as f32 / REFERENCE_DPI
    }

    fn px(&self, reference: f32) -> i32 {
        (reference * self.scale()).round() as i32
    }

    /// Draw one label cell.
    ///
    /// Fails only when the barcode cannot be resolved or encoded.
    pub fn render_single_label(&self, record: &LabelRecord) -> Result<GrayImage> {
        let width = self.layout.label_w_px();
        let height = self.layout.label_h_px();
        let mut img = GrayImage::from_pixel(width.max(1), height.max(1), Luma([255u8]));
        let s = self.scale();

        self.fonts.draw(
            &mut img,
            self.px(LEFT),
            self.px(TOP),
            &record.style_name,
            NAME_PX * s,
            Weight::Bold,
        );
        self.fonts.draw(
            &mut img,
            self.px(LEFT),
            self.px(SECONDARY_Y),
            &format!("{}  |  {}", record.color_ref, record.size),
            SECONDARY_PX * s,
            Weight::Regular,
        );
        self.fonts.draw(
            &mut img,
            self.px(LEFT),
            self.px(TERTIARY_Y),
            &record.art_season_ref,
            TERTIARY_PX * s,
            Weight::Regular,
        );

        let price = if self.dot_decimal_price {
            format_price(record.price.trim())
        } else {
            record.price.trim().to_string()
        };
        if !price.is_empty() {
            let price_w = self.fonts.measure(&price, NAME_PX * s, Weight::Bold) as i32;
            self.fonts.draw(
                &mut img,
                width as i32 - price_w - self.px(LEFT),
                self.px(TOP),
                &price,
                NAME_PX * s,
                Weight::Bold,
            );
        }

        self.draw_barcode(&mut img, &record.barcode_payload)?;
        Ok(img)
    }

    /// Fit the symbol into a fraction of the cell width and center it near the bottom.
    ///
    /// Every module gets the same whole number of pixels, so the drawn symbol
    /// may be narrower than the target width.
    fn draw_barcode(&self, img: &mut GrayImage, payload: &str) -> Result<()> {
        let (symbology, data) = barcode::resolve(payload)?;
        let symbol = self.encoder.encode(symbology, &data)?;

        let width = img.width();
        let height = img.height();
        let s = self.scale();

        let target_w = ((width as f64 * self.barcode.width_fraction) as u32).max(1);
        let module_px = (target_w / symbol.total_modules().max(1) as u32).max(1);
        let symbol_w = module_px * symbol.total_modules() as u32;
        let bars_h = ((symbol_w as f64 * self.barcode.aspect).round() as u32).max(1);
        let bars = symbol.to_image(module_px, bars_h);

        let digits = barcode::human_readable(symbology, &data);
        let digits_block = if self.barcode.human_readable {
            self.px(DIGITS_GAP) + self.fonts.line_height(DIGITS_PX * s, Weight::Regular) as i32
        } else {
            0
        };

        let block_h = bars_h as i32 + digits_block;
        let bottom_pad = (self.barcode.bottom_padding_px as f32 * s).round() as i32;
        let top = height as i32 - block_h - bottom_pad;
        let left = (width as i32 - symbol_w as i32) / 2;
        imageops::overlay(img, &bars, left as i64, top as i64);

        if self.barcode.human_readable {
            let digits_w = self.fonts.measure(&digits, DIGITS_PX * s, Weight::Regular) as i32;
            self.fonts.draw(
                img,
                (width as i32 - digits_w) / 2,
                top + bars_h as i32 + self.px(DIGITS_GAP),
                &digits,
                DIGITS_PX * s,
                Weight::Regular,
            );
        }
        Ok(())
    }
}
