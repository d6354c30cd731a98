//! # Etiquette - Product Label Generation Library
//!
//! Etiquette turns tabular product data (style, color, season, size, price,
//! barcode) into printable labels. It provides:
//!
//! - **Barcode validation**: EAN-13 checksum, 12-digit normalization, Code 128 fallback
//! - **Row mapping**: guessed, overridable column → field mapping with a filter report
//! - **Grid layout**: label cells placed on fixed-size pages with margins and gutters
//! - **Template filling**: named slots in an SVG template, word-wrapped text, embedded barcodes
//! - **Export**: multi-page PDF, PNG previews, ZIP bundles of per-label files
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::collections::HashMap;
//! use etiquette::{
//!     assemble::{Assembler, resolve_mapping},
//!     config::LabelConfig,
//!     input::{load_table, InputSource},
//! };
//!
//! let table = load_table(&InputSource::FilePath("products.csv".into()))?;
//! let mapping = resolve_mapping(&table, &HashMap::new())?;
//!
//! let assembler = Assembler::new(LabelConfig::default());
//! let batch = assembler.prepare(&table, mapping)?;
//! let pdf = assembler.raster_pdf(&batch)?;
//!
//! std::fs::write("labels.pdf", &pdf.bytes)?;
//! # Ok::<(), etiquette::error::EtiquetteError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`barcode`] | EAN-13 rules and symbol encoding |
//! | [`input`] | CSV / TSV / JSON / Excel loading |
//! | [`record`] | Field mapping and row coercion |
//! | [`layout`] | Page grid arithmetic |
//! | [`template`] | Markup tree and slot filling |
//! | [`raster`] | Bitmap label drawing and page composition |
//! | [`export`] | PDF, markup rendering, ZIP |
//! | [`assemble`] | Batch orchestration |
//! | [`config`] | JSON configuration |
//! | [`server`] | HTTP API |
//! | [`error`] | Error types |

pub mod assemble;
pub mod barcode;
pub mod config;
pub mod error;
pub mod export;
pub mod input;
pub mod layout;
pub mod raster;
pub mod record;
pub mod server;
pub mod template;

// Re-exports for convenience
pub use config::LabelConfig;
pub use error::EtiquetteError;
pub use layout::LayoutSpec;
pub use record::LabelRecord;
