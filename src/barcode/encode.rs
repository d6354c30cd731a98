//! Barcode encoding.
//!
//! Uses the barcoders crate for EAN-13 and Code 128 encoding. The encoded
//! modules can be drawn as a bitmap (raster labels) or emitted as a standalone
//! SVG document (template labels).

use std::fmt::Write as _;

use barcoders::sym::code128::Code128;
use barcoders::sym::ean13::EAN13;
use image::{GrayImage, Luma};

use super::Symbology;
use crate::error::{EtiquetteError, Result};

/// Quiet zone on each side of the symbol, in modules.
pub const QUIET_ZONE_MODULES: usize = 10;

/// An encoded 1D symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSymbol {
    pub symbology: Symbology,
    /// Data that was encoded (12 digits for EAN-13).
    pub data: String,
    /// One entry per module: true = bar (black), false = space (white).
    /// Does not include the quiet zone.
    pub modules: Vec<bool>,
}

impl EncodedSymbol {
    /// Width in modules including both quiet zones.
    pub fn total_modules(&self) -> usize {
        self.modules.len() + 2 * QUIET_ZONE_MODULES
    }

    /// Runs of consecutive bars as `(start_module, width_modules)`, quiet zone excluded.
    pub fn bar_runs(&self) -> Vec<(usize, usize)> {
        let mut runs = Vec::new();
        let mut start = None;
        for (i, &bar) in self.modules.iter().enumerate() {
            match (bar, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    runs.push((s, i - s));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push((s, self.modules.len() - s));
        }
        runs
    }

    /// Draw the symbol as a grayscale bitmap.
    ///
    /// Each module becomes `module_px` pixels wide; bars span the full `height_px`.
    pub fn to_image(&self, module_px: u32, height_px: u32) -> GrayImage {
        let module_px = module_px.max(1);
        let width = self.total_modules() as u32 * module_px;
        let mut img = GrayImage::from_pixel(width, height_px.max(1), Luma([255u8]));
        for (start, len) in self.bar_runs() {
            let x0 = (start + QUIET_ZONE_MODULES) as u32 * module_px;
            let x1 = x0 + len as u32 * module_px;
            for x in x0..x1 {
                for y in 0..img.height() {
                    img.put_pixel(x, y, Luma([0u8]));
                }
            }
        }
        img
    }

    /// Emit the symbol as an SVG document sized in user units (one unit per module).
    pub fn to_svg(&self, height_modules: u32) -> String {
        let width = self.total_modules();
        let height = height_modules.max(1);
        let mut svg = String::new();
        // Writing into a String cannot fail
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" shape-rendering="crispEdges">"#,
            w = width,
            h = height
        );
        let _ = write!(
            svg,
            r##"<rect x="0" y="0" width="{}" height="{}" fill="#ffffff"/>"##,
            width, height
        );
        for (start, len) in self.bar_runs() {
            let _ = write!(
                svg,
                r##"<rect x="{}" y="0" width="{}" height="{}" fill="#000000"/>"##,
                start + QUIET_ZONE_MODULES,
                len,
                height
            );
        }
        svg.push_str("</svg>");
        svg
    }
}

/// Black-box symbol encoder.
///
/// The label pipelines only depend on this contract; tests can substitute
/// their own implementation.
pub trait BarcodeEncoder: Send + Sync {
    /// Encode `data` (already resolved for `symbology`) into modules.
    fn encode(&self, symbology: Symbology, data: &str) -> Result<EncodedSymbol>;
}

/// Encoder backed by the `barcoders` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BarcodersEncoder;

impl BarcodeEncoder for BarcodersEncoder {
    fn encode(&self, symbology: Symbology, data: &str) -> Result<EncodedSymbol> {
        let encoded = match symbology {
            Symbology::Ean13 => EAN13::new(data)
                .map_err(|e| EtiquetteError::InvalidBarcode {
                    payload: data.to_string(),
                    reason: format!("EAN-13 encoder rejected payload: {}", e),
                })?
                .encode(),
            Symbology::Code128 => {
                // Character set B (Ɓ) covers all printable ASCII
                let prefixed_data = format!("\u{0181}{}", data);
                Code128::new(&prefixed_data)
                    .map_err(|e| EtiquetteError::InvalidBarcode {
                        payload: data.to_string(),
                        reason: format!("Code 128 encoder rejected payload: {}", e),
                    })?
                    .encode()
            }
        };

        Ok(EncodedSymbol {
            symbology,
            data: data.to_string(),
            modules: encoded.iter().map(|&m| m == 1).collect(),
        })
    }
}
