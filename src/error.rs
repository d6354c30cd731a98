//! # Error Types
//!
//! This module defines error types used throughout the etiquette library.
//!
//! | Variant | Policy |
//! |---------|--------|
//! | `InvalidBarcode` | row is filtered out of the batch (reported, not fatal) |
//! | `MissingSlot` | only from strict lookups; slot fills are no-ops instead |
//! | `UnsupportedInputFormat` | batch-fatal, raised by the loader before processing |
//! | `Render` | per-record during preview and export, fatal when nothing rendered |
//! | `EmptyBatch` | batch-fatal, distinguishes "no input" from "all rows invalid" |

use std::fmt;

use thiserror::Error;

/// Why a batch ended up with nothing to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyBatchReason {
    /// The input table had no data rows.
    NoInput,
    /// Every row was rejected while coercing (usually bad barcodes).
    AllRowsInvalid { rejected: usize },
}

impl fmt::Display for EmptyBatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyBatchReason::NoInput => write!(f, "input contains no rows"),
            EmptyBatchReason::AllRowsInvalid { rejected } => write!(
                f,
                "all {} row(s) were rejected; check the mapped columns and EAN-13 codes",
                rejected
            ),
        }
    }
}

/// Main error type for etiquette operations
#[derive(Debug, Error)]
pub enum EtiquetteError {
    /// Barcode payload failed the EAN-13 length/checksum rules
    #[error("Invalid barcode '{payload}': {reason}")]
    InvalidBarcode { payload: String, reason: String },

    /// Template has no element with the requested id
    #[error("Template has no element with id '{id}'")]
    MissingSlot { id: String },

    /// Input file extension is not one the loader understands
    #[error("Unsupported file type: {0}")]
    UnsupportedInputFormat(String),

    /// Tabular input could not be read or decoded
    #[error("Input error: {0}")]
    Input(String),

    /// Template markup could not be parsed or serialized
    #[error("Template error: {0}")]
    Template(String),

    /// Label, barcode or markup rendering failed
    #[error("Render error: {0}")]
    Render(String),

    /// Image processing error
    #[error("Image error: {0}")]
    Image(String),

    /// PDF assembly error
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Archive (zip) assembly error
    #[error("Archive error: {0}")]
    Archive(String),

    /// Invalid configuration or mapping override
    #[error("Config error: {0}")]
    Config(String),

    /// Nothing left to render after filtering
    #[error("Empty batch: {0}")]
    EmptyBatch(EmptyBatchReason),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, EtiquetteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_messages_differ() {
        let none = EtiquetteError::EmptyBatch(EmptyBatchReason::NoInput).to_string();
        let invalid =
            EtiquetteError::EmptyBatch(EmptyBatchReason::AllRowsInvalid { rejected: 3 }).to_string();
        assert!(none.contains("no rows"));
        assert!(invalid.contains("all 3 row(s)"));
        assert_ne!(none, invalid);
    }
}
