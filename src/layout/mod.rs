//! # Grid Layout
//!
//! Places label cells on fixed-size pages.
//!
//! ## Page Geometry
//!
//! ```text
//! ┌──────────────────────────── page_width ───────────────────────────┐
//! │ margin                                                            │
//! │   ┌── label_width ──┐ gutter ┌── label_width ──┐                  │
//! │   │ (col 0, row 0)  │        │ (col 1, row 0)  │                  │
//! │   └─────────────────┘        └─────────────────┘                  │
//! │          gutter                                                   │
//! │   ┌─────────────────┐        ┌─────────────────┐                  │
//! │   │ (col 0, row 1)  │        │ (col 1, row 1)  │                  │
//! ```
//!
//! Labels advance column-first, then row, then page. Cells that do not fit on
//! the page are still placed at their computed coordinates; keeping the grid
//! inside the page is the configuration's job.
//!
//! ## Units
//!
//! Sizes are millimeters; placement is in device pixels:
//! `px = round(mm × dpi / 25.4)` with halves rounded away from zero.

use serde::{Deserialize, Serialize};

use crate::error::{EtiquetteError, Result};

/// Convert millimeters to device pixels.
///
/// ## Example
///
/// ```
/// use etiquette::layout::mm_to_px;
///
/// assert_eq!(mm_to_px(25.4, 300), 300);
/// assert_eq!(mm_to_px(4.0, 300), 47);
/// ```
#[inline]
pub fn mm_to_px(mm: f64, dpi: u32) -> u32 {
    (mm * dpi as f64 / 25.4).round().max(0.0) as u32
}

const MAX_COLS: u32 = 6;
const MAX_ROWS: u32 = 12;
const MIN_DPI: u32 = 150;
const MAX_DPI: u32 = 600;
const MAX_LABEL_MM: f64 = 120.0;
const MAX_SPACING_MM: f64 = 20.0;
const MAX_PAGE_MM: f64 = 600.0;

/// `value` must be finite, at most `max`, and positive (or zero when `allow_zero`).
fn check_mm(name: &str, value: f64, allow_zero: bool, max: f64) -> Result<()> {
    let above_min = if allow_zero { value >= 0.0 } else { value > 0.0 };
    if value.is_finite() && above_min && value <= max {
        return Ok(());
    }
    let lower = if allow_zero { "0" } else { "above 0" };
    Err(EtiquetteError::Config(format!(
        "{} must be {} and at most {} mm (got {})",
        name, lower, max, value
    )))
}

/// Label sheet geometry. Defaults to a 2×5 grid of 80×50 mm labels on A4 at 300 DPI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSpec {
    pub label_width_mm: f64,
    pub label_height_mm: f64,
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub margin_mm: f64,
    pub gutter_mm: f64,
    pub cols: u32,
    pub rows: u32,
    /// Resolution in dots per inch
    pub dpi: u32,
}

impl Default for LayoutSpec {
    fn default() -> Self {
        Self {
            label_width_mm: 80.0,
            label_height_mm: 50.0,
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 4.0,
            gutter_mm: 4.0,
            cols: 2,
            rows: 5,
            dpi: 300,
        }
    }
}

impl LayoutSpec {
    /// Reject specs that cannot be laid out, or that would need unreasonably
    /// large bitmaps.
    ///
    /// | Setting | Accepted range |
    /// |---------|----------------|
    /// | `cols` | 1 to 6 |
    /// | `rows` | 1 to 12 |
    /// | `dpi` | 150 to 600 |
    /// | label width / height | above 0, up to 120 mm |
    /// | margin / gutter | 0 to 20 mm |
    /// | page width / height | above 0, up to 600 mm |
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_COLS).contains(&self.cols) || !(1..=MAX_ROWS).contains(&self.rows) {
            return Err(EtiquetteError::Config(format!(
                "grid must be 1-{} columns by 1-{} rows (got {}×{})",
                MAX_COLS, MAX_ROWS, self.cols, self.rows
            )));
        }
        if !(MIN_DPI..=MAX_DPI).contains(&self.dpi) {
            return Err(EtiquetteError::Config(format!(
                "dpi must be between {} and {} (got {})",
                MIN_DPI, MAX_DPI, self.dpi
            )));
        }
        check_mm("label_width_mm", self.label_width_mm, false, MAX_LABEL_MM)?;
        check_mm("label_height_mm", self.label_height_mm, false, MAX_LABEL_MM)?;
        check_mm("margin_mm", self.margin_mm, true, MAX_SPACING_MM)?;
        check_mm("gutter_mm", self.gutter_mm, true, MAX_SPACING_MM)?;
        check_mm("page_width_mm", self.page_width_mm, false, MAX_PAGE_MM)?;
        check_mm("page_height_mm", self.page_height_mm, false, MAX_PAGE_MM)?;
        Ok(())
    }

    pub fn label_w_px(&self) -> u32 {
        mm_to_px(self.label_width_mm, self.dpi)
    }

    pub fn label_h_px(&self) -> u32 {
        mm_to_px(self.label_height_mm, self.dpi)
    }

    pub fn page_w_px(&self) -> u32 {
        mm_to_px(self.page_width_mm, self.dpi)
    }

    pub fn page_h_px(&self) -> u32 {
        mm_to_px(self.page_height_mm, self.dpi)
    }

    pub fn margin_px(&self) -> u32 {
        mm_to_px(self.margin_mm, self.dpi)
    }

    pub fn gutter_px(&self) -> u32 {
        mm_to_px(self.gutter_mm, self.dpi)
    }

    /// Labels per page (cols × rows).
    pub fn per_page(&self) -> usize {
        self.cols.max(1) as usize * self.rows.max(1) as usize
    }

    /// True when the grid is wider or taller than the page.
    ///
    /// Overflow is reported, never corrected.
    pub fn overflows_page(&self) -> bool {
        let cols = self.cols as f64;
        let rows = self.rows as f64;
        let width = 2.0 * self.margin_mm
            + cols * self.label_width_mm
            + (cols - 1.0).max(0.0) * self.gutter_mm;
        let height = 2.0 * self.margin_mm
            + rows * self.label_height_mm
            + (rows - 1.0).max(0.0) * self.gutter_mm;
        width > self.page_width_mm || height > self.page_height_mm
    }
}

/// Where one label lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellPlacement {
    /// Sequential label index across the whole batch
    pub index: usize,
    pub page: usize,
    pub col: u32,
    pub row: u32,
    /// Pixel origin (top-left) within the page canvas
    pub x: u32,
    pub y: u32,
    /// Set on the first cell of every page after the first: the previous
    /// page is complete and can be flushed.
    pub flushes_previous_page: bool,
}

/// Map a sequential label index to its page and pixel origin.
///
/// Fails with [`EtiquetteError::Config`] when the origin does not fit in
/// pixel coordinates.
pub fn compute_cell_origin(index: usize, spec: &LayoutSpec) -> Result<CellPlacement> {
    let cols = spec.cols.max(1) as usize;
    let per_page = spec.per_page();
    let page = index / per_page;
    let slot = index % per_page;
    let col = (slot % cols) as u32;
    let row = (slot / cols) as u32;

    let axis = |n: u32, label_px: u32| {
        label_px
            .checked_add(spec.gutter_px())
            .and_then(|pitch| pitch.checked_mul(n))
            .and_then(|offset| offset.checked_add(spec.margin_px()))
            .ok_or_else(|| {
                EtiquetteError::Config(format!(
                    "cell {} lies outside the addressable page area",
                    index
                ))
            })
    };

    Ok(CellPlacement {
        index,
        page,
        col,
        row,
        x: axis(col, spec.label_w_px())?,
        y: axis(row, spec.label_h_px())?,
        flushes_previous_page: slot == 0 && page > 0,
    })
}

/// Cells assigned to one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagePlan {
    pub index: usize,
    pub cells: Vec<CellPlacement>,
}

/// Distribute `n_records` labels over pages.
///
/// Always returns at least one page; the last page may be partially filled.
pub fn paginate(n_records: usize, spec: &LayoutSpec) -> Result<Vec<PagePlan>> {
    let mut pages = vec![PagePlan {
        index: 0,
        cells: Vec::new(),
    }];

    for i in 0..n_records {
        let cell = compute_cell_origin(i, spec)?;
        if cell.flushes_previous_page {
            pages.push(PagePlan {
                index: cell.page,
                cells: Vec::new(),
            });
        }
        if let Some(current) = pages.last_mut() {
            current.cells.push(cell);
        }
    }

    Ok(pages)
}
