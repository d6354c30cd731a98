//! # Barcode Validation
//!
//! Validates and normalizes product codes before they reach an encoder.
//!
//! ## EAN-13 Check Digit
//!
//! ```text
//! digits:   d0 d1 d2 d3 d4 d5 d6 d7 d8 d9 d10 d11 | check
//! weights:   1  3  1  3  1  3  1  3  1  3  1   3  |
//! check = (10 - (weighted sum mod 10)) mod 10
//! ```
//!
//! Payloads are stripped of every non-digit character first, so
//! `"3607 1866 8138 1"` and `"3607186681381"` are the same code.
//!
//! | Digits after stripping | `validate` | `normalize_to_12` |
//! |------------------------|------------|-------------------|
//! | 12 | true (check digit added by the encoder) | unchanged |
//! | 13, checksum ok | true | check digit dropped |
//! | 13, checksum wrong | false | `InvalidBarcode` |
//! | anything else | false | `InvalidBarcode` |
//!
//! ## Example
//!
//! ```
//! use etiquette::barcode::{self, Symbology};
//!
//! assert!(barcode::validate("3607186681381"));
//! assert_eq!(barcode::normalize_to_12("3607186681381").unwrap(), "360718668138");
//! assert_eq!(barcode::choose_symbology("ART-12345"), Symbology::Code128);
//! ```

pub mod encode;

pub use encode::{BarcodeEncoder, BarcodersEncoder, EncodedSymbol};

use serde::{Deserialize, Serialize};

use crate::error::{EtiquetteError, Result};

/// Barcode symbologies the label pipelines can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbology {
    /// EAN-13, encoded from a 12-digit payload (check digit computed)
    Ean13,
    /// Code 128 (set B), for arbitrary printable ASCII payloads
    Code128,
}

/// Keep only ASCII digits.
pub(crate) fn digits_only(code: &str) -> String {
    code.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Compute the EAN-13 check digit for a 12-digit body.
///
/// Returns `None` unless `body` is exactly 12 ASCII digits.
pub fn ean13_check_digit(body: &str) -> Option<u8> {
    if body.len() != 12 || !body.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let sum: u32 = body
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let d = (b - b'0') as u32;
            if i % 2 == 0 { d } else { d * 3 }
        })
        .sum();
    Some(((10 - (sum % 10)) % 10) as u8)
}

/// Check whether a code is acceptable for EAN-13 encoding.
///
/// 12 digits are accepted as-is (the encoder appends the check digit);
/// 13 digits must carry a correct check digit.
pub fn validate(code: &str) -> bool {
    let digits = digits_only(code);
    match digits.len() {
        12 => true,
        13 => {
            let (body, check) = digits.split_at(12);
            ean13_check_digit(body) == Some(check.as_bytes()[0] - b'0')
        }
        _ => false,
    }
}

/// Reduce a code to the 12-digit payload an EAN-13 encoder expects.
pub fn normalize_to_12(code: &str) -> Result<String> {
    let digits = digits_only(code);
    match digits.len() {
        12 => Ok(digits),
        13 if validate(&digits) => Ok(digits[..12].to_string()),
        13 => Err(EtiquetteError::InvalidBarcode {
            payload: code.to_string(),
            reason: "EAN-13 check digit does not match".to_string(),
        }),
        n => Err(EtiquetteError::InvalidBarcode {
            payload: code.to_string(),
            reason: format!("expected 12 or 13 digits, found {}", n),
        }),
    }
}

/// Pick a symbology for a raw payload.
///
/// All-digit payloads of at least 12 digits are EAN-13 (the first 12 digits are
/// used); anything else falls back to Code 128.
pub fn choose_symbology(payload: &str) -> Symbology {
    let payload = payload.trim();
    if payload.len() >= 12 && payload.bytes().all(|b| b.is_ascii_digit()) {
        Symbology::Ean13
    } else {
        Symbology::Code128
    }
}

/// Digits grouped with spaces or hyphens, and nothing else.
fn is_grouped_number(payload: &str) -> bool {
    payload.bytes().any(|b| b.is_ascii_digit())
        && payload
            .bytes()
            .all(|b| b.is_ascii_digit() || b == b' ' || b == b'-')
}

/// Resolve a payload into the symbology and the exact data handed to the encoder.
///
/// A numeric payload (digits, optionally grouped with spaces or hyphens) that
/// normalizes to EAN-13 wins. Payloads with any other character are never
/// reduced to their digits; the decision is delegated to [`choose_symbology`].
pub fn resolve(payload: &str) -> Result<(Symbology, String)> {
    if is_grouped_number(payload.trim()) {
        if let Ok(code12) = normalize_to_12(payload) {
            return Ok((Symbology::Ean13, code12));
        }
    }
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(EtiquetteError::InvalidBarcode {
            payload: payload.to_string(),
            reason: "empty payload".to_string(),
        });
    }
    match choose_symbology(trimmed) {
        Symbology::Ean13 => Ok((Symbology::Ean13, trimmed[..12].to_string())),
        Symbology::Code128 => Ok((Symbology::Code128, trimmed.to_string())),
    }
}

/// Human-readable text printed under a symbol.
///
/// EAN-13 shows all 13 digits including the computed check digit.
pub fn human_readable(symbology: Symbology, data: &str) -> String {
    match symbology {
        Symbology::Ean13 => match ean13_check_digit(data) {
            Some(check) => format!("{}{}", data, check),
            None => data.to_string(),
        },
        Symbology::Code128 => data.to_string(),
    }
}
