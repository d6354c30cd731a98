//! # Label Records
//!
//! Maps heterogeneous input rows onto the fixed label schema.
//!
//! ## Fields
//!
//! | Field | Record member | Guessed from (case-insensitive, first match wins) |
//! |-------|---------------|----------------------------------------------------|
//! | `STYLE_NAME` | `style_name` | style, style_name, product, style name, stylename |
//! | `COLOR_NAME_REF` | `color_ref` | color, colour, color_name, color ref, color_name_ref, colorref |
//! | `ART_SEASON_STYLE_REF` | `art_season_ref` | season, art, art_season_style_ref, season_ref, style_ref, artseason, styleref |
//! | `SIZE_VALUE` | `size` | size, taille, taille_m, size_value |
//! | `PRICE_VALUE` | `price` | price, msrp, prix |
//! | `BARCODE` | `barcode_payload` | ean, barcode, code, ean13 |
//!
//! ## Flow
//!
//! ```text
//! Table ──normalize_headers──► auto_guess_mapping ──(user overrides)──► ColumnMapping
//!   rows ──coerce_row──► LabelRecord ──barcode gate──► kept | RejectedRow
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::barcode;
use crate::error::{EtiquetteError, Result};
use crate::input::{Row, Table};

/// Semantic label fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Field {
    StyleName,
    ColorNameRef,
    ArtSeasonStyleRef,
    SizeValue,
    PriceValue,
    Barcode,
}

impl Field {
    /// All fields in guessing order.
    pub const ALL: [Field; 6] = [
        Field::StyleName,
        Field::ColorNameRef,
        Field::ArtSeasonStyleRef,
        Field::SizeValue,
        Field::PriceValue,
        Field::Barcode,
    ];

    /// Canonical upper-case name (also the default template slot id).
    pub fn name(self) -> &'static str {
        match self {
            Field::StyleName => "STYLE_NAME",
            Field::ColorNameRef => "COLOR_NAME_REF",
            Field::ArtSeasonStyleRef => "ART_SEASON_STYLE_REF",
            Field::SizeValue => "SIZE_VALUE",
            Field::PriceValue => "PRICE_VALUE",
            Field::Barcode => "BARCODE",
        }
    }

    /// Ranked column-name candidates, lower case.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Field::StyleName => &["style", "style_name", "product", "style name", "stylename"],
            Field::ColorNameRef => &[
                "color",
                "colour",
                "color_name",
                "color ref",
                "color_name_ref",
                "colorref",
            ],
            Field::ArtSeasonStyleRef => &[
                "season",
                "art",
                "art_season_style_ref",
                "season_ref",
                "style_ref",
                "artseason",
                "styleref",
            ],
            Field::SizeValue => &["size", "taille", "taille_m", "size_value"],
            Field::PriceValue => &["price", "msrp", "prix"],
            Field::Barcode => &["ean", "barcode", "code", "ean13"],
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = EtiquetteError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase();
        Field::ALL
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| EtiquetteError::Config(format!("unknown field '{}'", s.trim())))
    }
}

/// One normalized label. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRecord {
    /// Zero-based index of the source row, kept for naming and error context.
    pub source_row: usize,
    pub style_name: String,
    pub color_ref: String,
    pub art_season_ref: String,
    pub size: String,
    pub price: String,
    pub barcode_payload: String,
}

impl LabelRecord {
    /// Value of a semantic field.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::StyleName => &self.style_name,
            Field::ColorNameRef => &self.color_ref,
            Field::ArtSeasonStyleRef => &self.art_season_ref,
            Field::SizeValue => &self.size,
            Field::PriceValue => &self.price,
            Field::Barcode => &self.barcode_payload,
        }
    }

    fn set(&mut self, field: Field, value: String) {
        match field {
            Field::StyleName => self.style_name = value,
            Field::ColorNameRef => self.color_ref = value,
            Field::ArtSeasonStyleRef => self.art_season_ref = value,
            Field::SizeValue => self.size = value,
            Field::PriceValue => self.price = value,
            Field::Barcode => self.barcode_payload = value,
        }
    }
}

/// Field → column correspondence. `None` means the field stays empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping(BTreeMap<Field, Option<String>>);

impl ColumnMapping {
    /// Column mapped to `field`, if any.
    pub fn column(&self, field: Field) -> Option<&str> {
        self.0.get(&field).and_then(|c| c.as_deref())
    }

    /// Replace the column for `field`.
    pub fn set(&mut self, field: Field, column: Option<String>) {
        self.0.insert(field, column);
    }

    /// Check that every mapped column exists in `columns`.
    pub fn validate(&self, columns: &[String]) -> Result<()> {
        for (&field, column) in &self.0 {
            if let Some(column) = column {
                check_column(field, column, columns)?;
            }
        }
        Ok(())
    }

    /// Apply user overrides, checking that every named column exists.
    pub fn apply_overrides(
        &mut self,
        overrides: &HashMap<Field, String>,
        columns: &[String],
    ) -> Result<()> {
        for (&field, column) in overrides {
            check_column(field, column, columns)?;
            self.set(field, Some(column.clone()));
        }
        Ok(())
    }

    /// Iterate over `(field, column)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, Option<&str>)> + '_ {
        Field::ALL.into_iter().map(|f| (f, self.column(f)))
    }
}

fn check_column(field: Field, column: &str, columns: &[String]) -> Result<()> {
    if columns.iter().any(|c| c == column) {
        return Ok(());
    }
    Err(EtiquetteError::Config(format!(
        "mapping {}={} names a column that is not in the input (columns: {})",
        field,
        column,
        columns.join(", ")
    )))
}

/// Parse a `FIELD=column` override.
pub fn parse_override(spec: &str) -> Result<(Field, String)> {
    let (field, column) = spec.split_once('=').ok_or_else(|| {
        EtiquetteError::Config(format!("expected FIELD=column, got '{}'", spec))
    })?;
    Ok((field.parse()?, column.trim().to_string()))
}

/// Trim whitespace around column names. Case and inner spacing are kept.
pub fn normalize_headers(raw_columns: &[String]) -> Vec<String> {
    raw_columns.iter().map(|c| c.trim().to_string()).collect()
}

/// Guess which column feeds each field.
pub fn auto_guess_mapping(columns: &[String]) -> ColumnMapping {
    let lower: Vec<(String, &String)> = columns
        .iter()
        .map(|c| (c.to_lowercase(), c))
        .collect();

    let mut mapping = ColumnMapping::default();
    for field in Field::ALL {
        let found = field.candidates().iter().find_map(|cand| {
            lower
                .iter()
                .find(|(l, _)| l == cand)
                .map(|(_, original)| (*original).clone())
        });
        mapping.set(field, found);
    }
    debug!(?mapping, "guessed column mapping");
    mapping
}

/// Build a record from one raw row. Missing columns become empty strings.
pub fn coerce_row(source_row: usize, row: &Row, mapping: &ColumnMapping) -> LabelRecord {
    let mut record = LabelRecord {
        source_row,
        ..Default::default()
    };
    for field in Field::ALL {
        let value = mapping
            .column(field)
            .and_then(|c| row.get(c))
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        record.set(field, value);
    }
    record
}

/// How strictly barcodes gate rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BarcodePolicy {
    /// Only codes passing EAN-13 validation are kept.
    #[default]
    Ean13Only,
    /// Any non-empty payload is kept; non-EAN payloads become Code 128.
    AllowCode128,
}

/// A row dropped during coercion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub index: usize,
    pub payload: String,
    pub reason: String,
}

/// Counts of kept and filtered rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub total: usize,
    pub kept: usize,
    pub rejected: Vec<RejectedRow>,
}

impl FilterReport {
    /// Human-readable warnings, one per rejected row (1-based row numbers).
    pub fn warnings(&self) -> Vec<String> {
        self.rejected
            .iter()
            .map(|r| {
                format!(
                    "row {}: {} '{}' rejected: {}",
                    r.index + 1,
                    Field::Barcode,
                    r.payload,
                    r.reason
                )
            })
            .collect()
    }
}

fn rejection_reason(payload: &str, policy: BarcodePolicy) -> Option<String> {
    if payload.trim().is_empty() {
        return Some("empty payload".to_string());
    }
    match policy {
        BarcodePolicy::AllowCode128 => None,
        BarcodePolicy::Ean13Only => match barcode::normalize_to_12(payload) {
            Ok(_) => None,
            Err(EtiquetteError::InvalidBarcode { reason, .. }) => Some(reason),
            Err(e) => Some(e.to_string()),
        },
    }
}

/// Coerce every row, dropping those whose barcode fails the policy.
pub fn coerce_rows(
    table: &Table,
    mapping: &ColumnMapping,
    policy: BarcodePolicy,
) -> (Vec<LabelRecord>, FilterReport) {
    let mut records = Vec::with_capacity(table.rows.len());
    let mut report = FilterReport {
        total: table.rows.len(),
        ..Default::default()
    };

    for (index, row) in table.rows.iter().enumerate() {
        let mut record = coerce_row(index, row, mapping);
        match rejection_reason(&record.barcode_payload, policy) {
            None => {
                // Strict mode keeps only the digits that passed validation
                if policy == BarcodePolicy::Ean13Only {
                    record.barcode_payload = barcode::digits_only(&record.barcode_payload);
                }
                records.push(record);
            }
            Some(reason) => {
                debug!(row = index, payload = %record.barcode_payload, %reason, "row rejected");
                report.rejected.push(RejectedRow {
                    index,
                    payload: record.barcode_payload,
                    reason,
                });
            }
        }
    }

    report.kept = records.len();
    if report.rejected.is_empty() {
        info!(kept = report.kept, "all rows accepted");
    } else {
        warn!(
            kept = report.kept,
            rejected = report.rejected.len(),
            "rows with invalid barcodes were filtered out"
        );
    }
    (records, report)
}

/// Replace decimal commas with dots (`"59,99 €"` → `"59.99 €"`).
pub fn format_price(price: &str) -> String {
    price.replace(',', ".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_headers_trims_only() {
        let cols = normalize_headers(&columns(&["  Style Name ", "EAN\t", "price"]));
        assert_eq!(cols, columns(&["Style Name", "EAN", "price"]));
    }

    #[test]
    fn test_auto_guess_case_insensitive() {
        let cols = columns(&["Style", "Colour", "Season", "Taille", "PRIX", "EAN13"]);
        let mapping = auto_guess_mapping(&cols);
        assert_eq!(mapping.column(Field::StyleName), Some("Style"));
        assert_eq!(mapping.column(Field::ColorNameRef), Some("Colour"));
        assert_eq!(mapping.column(Field::ArtSeasonStyleRef), Some("Season"));
        assert_eq!(mapping.column(Field::SizeValue), Some("Taille"));
        assert_eq!(mapping.column(Field::PriceValue), Some("PRIX"));
        assert_eq!(mapping.column(Field::Barcode), Some("EAN13"));
    }

    #[test]
    fn test_auto_guess_respects_rank() {
        // "ean" outranks "barcode" even when it comes later in the header
        let cols = columns(&["barcode", "ean"]);
        let mapping = auto_guess_mapping(&cols);
        assert_eq!(mapping.column(Field::Barcode), Some("ean"));
    }

    #[test]
    fn test_auto_guess_missing_is_none() {
        let mapping = auto_guess_mapping(&columns(&["foo", "bar"]));
        for (_, column) in mapping.iter() {
            assert_eq!(column, None);
        }
    }

    #[test]
    fn test_auto_guess_camel_case_headers() {
        let cols = columns(&["styleName", "colorRef", "artSeason", "size", "price", "barcode"]);
        let mapping = auto_guess_mapping(&cols);
        assert_eq!(mapping.column(Field::StyleName), Some("styleName"));
        assert_eq!(mapping.column(Field::ColorNameRef), Some("colorRef"));
        assert_eq!(mapping.column(Field::ArtSeasonStyleRef), Some("artSeason"));
    }

    #[test]
    fn test_overrides_replace_guess() {
        let cols = columns(&["style", "name"]);
        let mut mapping = auto_guess_mapping(&cols);
        let overrides = HashMap::from([(Field::StyleName, "name".to_string())]);
        mapping.apply_overrides(&overrides, &cols).unwrap();
        assert_eq!(mapping.column(Field::StyleName), Some("name"));
    }

    #[test]
    fn test_overrides_unknown_column() {
        let cols = columns(&["style"]);
        let mut mapping = auto_guess_mapping(&cols);
        let overrides = HashMap::from([(Field::Barcode, "gtin".to_string())]);
        assert!(matches!(
            mapping.apply_overrides(&overrides, &cols),
            Err(EtiquetteError::Config(_))
        ));
    }

    #[test]
    fn test_mapping_validate_rejects_unknown_column() {
        let cols = columns(&["Style", "EAN"]);
        let mut mapping = auto_guess_mapping(&cols);
        assert!(mapping.validate(&cols).is_ok());

        mapping.set(Field::Barcode, Some("GTIN".to_string()));
        assert!(matches!(
            mapping.validate(&cols),
            Err(EtiquetteError::Config(msg)) if msg.contains("GTIN")
        ));
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("barcode=GTIN").unwrap(),
            (Field::Barcode, "GTIN".to_string())
        );
        assert!(parse_override("nope").is_err());
        assert!(parse_override("WHATEVER=x").is_err());
    }

    #[test]
    fn test_coerce_row_fills_missing_with_empty() {
        let mapping = auto_guess_mapping(&columns(&["style", "barcode", "size"]));
        let record = coerce_row(3, &row(&[("style", " Hoodie "), ("barcode", "3607186681381")]), &mapping);
        assert_eq!(record.source_row, 3);
        assert_eq!(record.style_name, "Hoodie");
        assert_eq!(record.size, "");
        assert_eq!(record.color_ref, "");
        assert_eq!(record.barcode_payload, "3607186681381");
    }

    #[test]
    fn test_coerce_rows_filters_and_counts() {
        let table = Table {
            columns: columns(&["style", "barcode"]),
            rows: vec![
                row(&[("style", "A"), ("barcode", "3607186681381")]),
                row(&[("style", "B"), ("barcode", "3607186681382")]),
                row(&[("style", "C"), ("barcode", "")]),
                row(&[("style", "D"), ("barcode", "400638133393")]),
            ],
        };
        let mapping = auto_guess_mapping(&table.columns);
        let (records, report) = coerce_rows(&table, &mapping, BarcodePolicy::Ean13Only);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].style_name, "A");
        assert_eq!(records[1].style_name, "D");
        assert_eq!(records[1].source_row, 3);
        assert_eq!(report.total, 4);
        assert_eq!(report.kept, 2);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].index, 1);
        assert_eq!(report.rejected[1].reason, "empty payload");
        assert_eq!(report.warnings().len(), 2);
        assert!(report.warnings()[0].starts_with("row 2:"));
    }

    #[test]
    fn test_coerce_rows_allow_code128() {
        let table = Table {
            columns: columns(&["barcode"]),
            rows: vec![row(&[("barcode", "SKU-42")]), row(&[("barcode", " ")])],
        };
        let mapping = auto_guess_mapping(&table.columns);
        let (records, report) = coerce_rows(&table, &mapping, BarcodePolicy::AllowCode128);
        assert_eq!(records.len(), 1);
        assert_eq!(report.rejected.len(), 1);
    }

    #[test]
    fn test_strict_mode_keeps_digits_for_ean_encoding() {
        let table = Table {
            columns: columns(&["barcode"]),
            rows: vec![row(&[("barcode", "EAN:3607186681381")])],
        };
        let mapping = auto_guess_mapping(&table.columns);

        let (strict, _) = coerce_rows(&table, &mapping, BarcodePolicy::Ean13Only);
        assert_eq!(strict[0].barcode_payload, "3607186681381");
        assert_eq!(
            barcode::resolve(&strict[0].barcode_payload).unwrap().0,
            barcode::Symbology::Ean13
        );

        let (lenient, _) = coerce_rows(&table, &mapping, BarcodePolicy::AllowCode128);
        assert_eq!(lenient[0].barcode_payload, "EAN:3607186681381");
        assert_eq!(
            barcode::resolve(&lenient[0].barcode_payload).unwrap().0,
            barcode::Symbology::Code128
        );
    }

    #[test]
    fn test_field_round_trip_names() {
        for field in Field::ALL {
            assert_eq!(field.name().parse::<Field>().unwrap(), field);
        }
        assert_eq!("barcode".parse::<Field>().unwrap(), Field::Barcode);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price("59,99 €"), "59.99 €");
        assert_eq!(format_price("100"), "100");
    }
}
