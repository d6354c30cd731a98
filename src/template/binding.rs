//! Slot bindings: which record field fills which template slot, and how.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TemplateDocument;
use crate::barcode::{self, BarcodeEncoder};
use crate::error::Result;
use crate::record::{Field, LabelRecord};

/// Default line step for wrapped text (template user units).
pub const DEFAULT_LINE_STEP: &str = "4";
/// Default wrap width for wrapped text, in characters.
pub const DEFAULT_MAX_CHARS: usize = 24;
/// Slot id that receives the barcode image by default.
pub const DEFAULT_BARCODE_SLOT: &str = "BARCODE_SLOT";

/// How a slot is filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FillStrategy {
    /// Single-line text; empty values hide the slot.
    Text,
    /// Word-wrapped text, one `tspan` per line.
    WrappedText { max_chars: usize, line_step: String },
    /// Encoded barcode embedded as an image of the given size.
    Barcode { width_mm: f64, height_mm: f64 },
}

/// Binds a record field to a slot id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotBinding {
    pub field: Field,
    pub target_id: String,
    pub strategy: FillStrategy,
}

impl SlotBinding {
    pub fn new(field: Field, target_id: impl Into<String>, strategy: FillStrategy) -> Self {
        Self {
            field,
            target_id: target_id.into(),
            strategy,
        }
    }
}

/// Bindings for the stock template: one slot per field, named after the field,
/// with the style name wrapped and the barcode going into `BARCODE_SLOT`.
pub fn default_bindings() -> Vec<SlotBinding> {
    Field::ALL
        .iter()
        .map(|&field| match field {
            Field::StyleName => SlotBinding::new(
                field,
                field.name(),
                FillStrategy::WrappedText {
                    max_chars: DEFAULT_MAX_CHARS,
                    line_step: DEFAULT_LINE_STEP.to_string(),
                },
            ),
            Field::Barcode => SlotBinding::new(
                field,
                DEFAULT_BARCODE_SLOT,
                FillStrategy::Barcode {
                    width_mm: 22.0,
                    height_mm: 10.0,
                },
            ),
            _ => SlotBinding::new(field, field.name(), FillStrategy::Text),
        })
        .collect()
}

/// What happened while filling one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Slot ids that were bound but absent from the template
    pub missing_slots: Vec<String>,
}

/// Fill every bound slot of `doc` from `record`.
///
/// Missing slots are collected, not fatal. A barcode that cannot be resolved
/// or encoded fails the record.
pub fn fill_record(
    doc: &mut TemplateDocument,
    bindings: &[SlotBinding],
    record: &LabelRecord,
    encoder: &dyn BarcodeEncoder,
) -> Result<FillReport> {
    let mut report = FillReport::default();

    for binding in bindings {
        let id = binding.target_id.as_str();
        if doc.find_by_id(id).is_none() {
            debug!(slot = id, field = %binding.field, "slot missing from template");
            report.missing_slots.push(id.to_string());
            continue;
        }
        let value = record.get(binding.field);

        match &binding.strategy {
            FillStrategy::Text => {
                doc.set_text(id, value, true);
            }
            FillStrategy::WrappedText {
                max_chars,
                line_step,
            } => {
                doc.set_text_wrapped(id, value, *max_chars, line_step);
            }
            FillStrategy::Barcode {
                width_mm,
                height_mm,
            } => {
                let (symbology, data) = barcode::resolve(value)?;
                let symbol = encoder.encode(symbology, &data)?;
                let aspect = if *width_mm > 0.0 {
                    height_mm / width_mm
                } else {
                    1.0
                };
                let height_modules = (symbol.total_modules() as f64 * aspect).round() as u32;
                doc.clear_children(id);
                doc.inject_embedded_image(id, &symbol.to_svg(height_modules), *width_mm, *height_mm);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::BarcodersEncoder;
    use crate::error::EtiquetteError;
    use pretty_assertions::assert_eq;

    const TEMPLATE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><text id="STYLE_NAME" x="4" y="8">Style</text><text id="SIZE_VALUE" x="4" y="20">S</text><text id="PRICE_VALUE" x="60" y="8">0</text><g id="BARCODE_SLOT"><rect/></g></svg>"#;

    fn record(style: &str, barcode: &str) -> LabelRecord {
        LabelRecord {
            source_row: 0,
            style_name: style.to_string(),
            color_ref: "BLK-900".to_string(),
            art_season_ref: "AW2024".to_string(),
            size: "XL".to_string(),
            price: String::new(),
            barcode_payload: barcode.to_string(),
        }
    }

    #[test]
    fn test_default_bindings() {
        let bindings = default_bindings();
        assert_eq!(bindings.len(), 6);
        let barcode = bindings.iter().find(|b| b.field == Field::Barcode).unwrap();
        assert_eq!(barcode.target_id, "BARCODE_SLOT");
        let style = bindings.iter().find(|b| b.field == Field::StyleName).unwrap();
        assert!(matches!(style.strategy, FillStrategy::WrappedText { max_chars: 24, .. }));
    }

    #[test]
    fn test_fill_record_reports_missing_slots() {
        let mut doc = TemplateDocument::parse(TEMPLATE).unwrap();
        let report = fill_record(
            &mut doc,
            &default_bindings(),
            &record("Hoodie", "3607186681381"),
            &BarcodersEncoder,
        )
        .unwrap();
        assert_eq!(report.missing_slots, vec!["COLOR_NAME_REF", "ART_SEASON_STYLE_REF"]);

        assert_eq!(doc.find_by_id("SIZE_VALUE").unwrap().text.as_deref(), Some("XL"));
        // Empty price hides the slot
        assert_eq!(doc.find_by_id("PRICE_VALUE").unwrap().attr("display"), Some("none"));
        let slot = doc.find_by_id("BARCODE_SLOT").unwrap();
        assert_eq!(slot.children.len(), 1);
        assert_eq!(slot.children[0].name, "image");
    }

    #[test]
    fn test_fill_twice_is_byte_identical() {
        let template = TemplateDocument::parse(TEMPLATE).unwrap();
        let rec = record("Summer Collection T-Shirt", "4006381333931");
        let mut doc = template.clone();
        fill_record(&mut doc, &default_bindings(), &rec, &BarcodersEncoder).unwrap();
        let first = doc.serialize().unwrap();
        fill_record(&mut doc, &default_bindings(), &rec, &BarcodersEncoder).unwrap();
        assert_eq!(doc.serialize().unwrap(), first);

        let mut fresh = template.clone();
        fill_record(&mut fresh, &default_bindings(), &rec, &BarcodersEncoder).unwrap();
        assert_eq!(fresh.serialize().unwrap(), first);
    }

    #[test]
    fn test_clones_do_not_cross_contaminate() {
        let template = TemplateDocument::parse(TEMPLATE).unwrap();
        let mut a = template.clone();
        let mut b = template.clone();
        fill_record(&mut a, &default_bindings(), &record("A", "4006381333931"), &BarcodersEncoder)
            .unwrap();
        let a_slot = a.find_by_id("BARCODE_SLOT").unwrap().clone();
        fill_record(&mut b, &default_bindings(), &record("B", "5901234123457"), &BarcodersEncoder)
            .unwrap();
        assert_eq!(a.find_by_id("BARCODE_SLOT").unwrap(), &a_slot);
        assert_ne!(&a_slot, b.find_by_id("BARCODE_SLOT").unwrap());
    }

    #[test]
    fn test_unencodable_barcode_fails_record() {
        let mut doc = TemplateDocument::parse(TEMPLATE).unwrap();
        let err = fill_record(&mut doc, &default_bindings(), &record("X", ""), &BarcodersEncoder)
            .unwrap_err();
        assert!(matches!(err, EtiquetteError::InvalidBarcode { .. }));
    }

    #[test]
    fn test_strategy_serde() {
        let json = r#"{"field":"STYLE_NAME","target_id":"name","strategy":{"kind":"wrapped_text","max_chars":10,"line_step":"5"}}"#;
        let binding: SlotBinding = serde_json::from_str(json).unwrap();
        assert_eq!(binding.field, Field::StyleName);
        assert_eq!(
            binding.strategy,
            FillStrategy::WrappedText {
                max_chars: 10,
                line_step: "5".to_string()
            }
        );
    }
}
