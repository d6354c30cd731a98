//! # Artifact Assembler
//!
//! Orchestrates one batch from table to bytes.
//!
//! ```text
//!                      ┌─► raster: LabelPainter ─► compose_pages ─► PDF / preview PNG
//! Table ─► prepare ────┤
//!                      └─► template: clone ─► fill_record ─► MarkupRenderer ─► ZIP
//! ```
//!
//! ## Failure policy
//!
//! | Failure | Outcome |
//! |---------|---------|
//! | no data rows | `EmptyBatch(NoInput)` |
//! | every row filtered | `EmptyBatch(AllRowsInvalid)` |
//! | one record fails to render | reported in [`BatchReport::failures`], rest delivered |
//! | every record fails to render | `Render` error, no output |
//!
//! Records are rendered in parallel; results are collected in input order.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use image::{DynamicImage, GrayImage};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::barcode::{BarcodeEncoder, BarcodersEncoder};
use crate::config::LabelConfig;
use crate::error::{EmptyBatchReason, EtiquetteError, Result};
use crate::export::{
    MarkupRenderer, ResvgRenderer, build_archive, encode_artifact, entry_name, pages_to_pdf,
};
use crate::input::Table;
use crate::raster::{self, Cell, FontCache, LabelPainter};
use crate::record::{
    ColumnMapping, Field, FilterReport, LabelRecord, auto_guess_mapping, coerce_rows,
    format_price,
};
use crate::template::{SlotBinding, TemplateDocument, fill_record};

/// A record that could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// Source row index (0-based)
    pub index: usize,
    /// Field at fault, when known
    pub field: Option<Field>,
    pub reason: String,
}

impl RecordFailure {
    fn from_error(record: &LabelRecord, error: &EtiquetteError) -> Self {
        let field = match error {
            EtiquetteError::InvalidBarcode { .. } => Some(Field::Barcode),
            _ => None,
        };
        Self {
            index: record.source_row,
            field,
            reason: error.to_string(),
        }
    }
}

/// Outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub filter: FilterReport,
    pub failures: Vec<RecordFailure>,
    /// Records that produced output
    pub rendered: usize,
    pub pages: usize,
    /// Bound slot ids absent from the template
    pub missing_slots: Vec<String>,
}

impl BatchReport {
    /// One line per rejected row, failed record and missing slot.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = self.filter.warnings();
        for failure in &self.failures {
            match failure.field {
                Some(field) => warnings.push(format!(
                    "row {}: {}: {}",
                    failure.index + 1,
                    field,
                    failure.reason
                )),
                None => warnings.push(format!("row {}: {}", failure.index + 1, failure.reason)),
            }
        }
        for slot in &self.missing_slots {
            warnings.push(format!("template has no slot '{}'", slot));
        }
        warnings
    }
}

/// Records ready to render, with the mapping and filter report that produced them.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub mapping: ColumnMapping,
    pub records: Vec<LabelRecord>,
    pub report: FilterReport,
}

/// Rendered preview of the first page.
#[derive(Debug, Clone)]
pub struct Preview {
    pub png: Vec<u8>,
    pub report: BatchReport,
}

/// Bytes of a finished artifact plus its report.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub report: BatchReport,
}

/// Guess a mapping for `table` and apply `FIELD=column` overrides.
pub fn resolve_mapping(table: &Table, overrides: &HashMap<Field, String>) -> Result<ColumnMapping> {
    let mut mapping = auto_guess_mapping(&table.columns);
    mapping.apply_overrides(overrides, &table.columns)?;
    Ok(mapping)
}

/// Owns one batch's configuration and caches.
///
/// Fonts, the parsed template and the markup renderer are loaded on first
/// use and dropped with the assembler.
pub struct Assembler {
    config: LabelConfig,
    encoder: Arc<dyn BarcodeEncoder>,
    fonts: FontCache,
    template: OnceLock<TemplateDocument>,
    renderer: OnceLock<Arc<dyn MarkupRenderer>>,
}

impl Assembler {
    pub fn new(config: LabelConfig) -> Self {
        let fonts = FontCache::new(config.fonts.clone());
        Self {
            config,
            encoder: Arc::new(BarcodersEncoder),
            fonts,
            template: OnceLock::new(),
            renderer: OnceLock::new(),
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn BarcodeEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_fonts(mut self, fonts: FontCache) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn with_renderer(self, renderer: Arc<dyn MarkupRenderer>) -> Self {
        let _ = self.renderer.set(renderer);
        self
    }

    /// Use an already parsed template instead of `template.path`.
    pub fn with_template(self, template: TemplateDocument) -> Self {
        let _ = self.template.set(template);
        self
    }

    pub fn config(&self) -> &LabelConfig {
        &self.config
    }

    fn template(&self) -> Result<&TemplateDocument> {
        if let Some(template) = self.template.get() {
            return Ok(template);
        }
        let path = self.config.template.path.as_ref().ok_or_else(|| {
            EtiquetteError::Config("no template configured (template.path)".to_string())
        })?;
        let loaded = TemplateDocument::load(path)?;
        debug!(path = %path.display(), elements = loaded.root().count(), "template loaded");
        let _ = self.template.set(loaded);
        self.template
            .get()
            .ok_or_else(|| EtiquetteError::Template("template cache unavailable".to_string()))
    }

    fn renderer(&self) -> &Arc<dyn MarkupRenderer> {
        self.renderer
            .get_or_init(|| Arc::new(ResvgRenderer::new()) as Arc<dyn MarkupRenderer>)
    }

    /// Coerce and filter rows.
    ///
    /// The configuration is validated first, so nothing is drawn for a layout
    /// out of range.
    pub fn prepare(&self, table: &Table, mapping: ColumnMapping) -> Result<PreparedBatch> {
        self.config.validate()?;
        if table.rows.is_empty() {
            return Err(EtiquetteError::EmptyBatch(EmptyBatchReason::NoInput));
        }
        let (records, report) = coerce_rows(table, &mapping, self.config.barcode.policy());
        if records.is_empty() {
            return Err(EtiquetteError::EmptyBatch(EmptyBatchReason::AllRowsInvalid {
                rejected: report.rejected.len(),
            }));
        }
        Ok(PreparedBatch {
            mapping,
            records,
            report,
        })
    }

    fn painter(&self) -> LabelPainter<'_> {
        LabelPainter {
            layout: &self.config.layout,
            barcode: &self.config.barcode,
            fonts: &self.fonts,
            encoder: self.encoder.as_ref(),
            dot_decimal_price: self.config.output.dot_decimal_price,
        }
    }

    /// Draw label cells in parallel; failed records leave an empty cell.
    fn render_cells(&self, records: &[LabelRecord]) -> (Vec<Cell>, Vec<RecordFailure>) {
        let painter = self.painter();
        let results: Vec<Result<GrayImage>> = records
            .par_iter()
            .map(|record| painter.render_single_label(record))
            .collect();

        let mut cells = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (record, result) in records.iter().zip(results) {
            match result {
                Ok(img) => cells.push(Some(img)),
                Err(e) => {
                    warn!(row = record.source_row, error = %e, "label failed to render");
                    failures.push(RecordFailure::from_error(record, &e));
                    cells.push(None);
                }
            }
        }
        (cells, failures)
    }

    /// Raster path: every record on grid pages, as one PDF.
    pub fn raster_pdf(&self, batch: &PreparedBatch) -> Result<Artifact> {
        let (cells, failures) = self.render_cells(&batch.records);
        let rendered = cells.iter().filter(|c| c.is_some()).count();
        if rendered == 0 {
            return Err(EtiquetteError::Render(format!(
                "none of the {} label(s) could be rendered",
                batch.records.len()
            )));
        }

        let pages: Vec<DynamicImage> = raster::compose_pages(&cells, &self.config.layout)?
            .into_iter()
            .map(DynamicImage::ImageLuma8)
            .collect();
        let bytes = pages_to_pdf(&pages, self.config.layout.dpi)?;
        info!(labels = rendered, pages = pages.len(), "PDF assembled");

        Ok(Artifact {
            bytes,
            report: BatchReport {
                filter: batch.report.clone(),
                failures,
                rendered,
                pages: pages.len(),
                missing_slots: Vec::new(),
            },
        })
    }

    /// First raster page, downscaled, as PNG. Failed records are reported, never fatal.
    pub fn preview(&self, batch: &PreparedBatch) -> Result<Preview> {
        let first_page = batch.records.len().min(self.config.layout.per_page());
        let (cells, failures) = self.render_cells(&batch.records[..first_page]);
        let rendered = cells.iter().filter(|c| c.is_some()).count();

        let page = raster::compose_pages(&cells, &self.config.layout)?
            .into_iter()
            .next()
            .ok_or_else(|| EtiquetteError::Render("layout produced no page".to_string()))?;
        let png = raster::encode_png(&raster::downscale(&page, raster::PREVIEW_SCALE))?;

        let total_pages = batch.records.len().div_ceil(self.config.layout.per_page()).max(1);
        Ok(Preview {
            png,
            report: BatchReport {
                filter: batch.report.clone(),
                failures,
                rendered,
                pages: total_pages,
                missing_slots: Vec::new(),
            },
        })
    }

    /// Fill, serialize and render one record on its own template clone.
    fn render_template_record(
        &self,
        template: &TemplateDocument,
        bindings: &[SlotBinding],
        record: &LabelRecord,
    ) -> Result<(Vec<u8>, Vec<String>)> {
        let output = &self.config.output;
        let mut record = record.clone();
        if output.dot_decimal_price {
            record.price = format_price(&record.price);
        }

        let mut doc = template.clone();
        let fill = fill_record(&mut doc, bindings, &record, self.encoder.as_ref())?;
        let markup = doc.serialize()?;
        let img = self.renderer().render(&markup, self.config.layout.dpi)?;
        let bytes = encode_artifact(img, output.format, self.config.layout.dpi)?;
        Ok((bytes, fill.missing_slots))
    }

    /// Template path: one file per record, bundled into a ZIP.
    pub fn template_archive(&self, batch: &PreparedBatch) -> Result<Artifact> {
        let template = self.template()?;
        let bindings = self.config.template.bindings();
        let output = &self.config.output;

        let results: Vec<Result<(Vec<u8>, Vec<String>)>> = batch
            .records
            .par_iter()
            .map(|record| self.render_template_record(template, &bindings, record))
            .collect();

        let mut entries = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        let mut missing = BTreeSet::new();
        for (position, (record, result)) in batch.records.iter().zip(results).enumerate() {
            match result {
                Ok((bytes, missing_slots)) => {
                    missing.extend(missing_slots);
                    let fields: Vec<&str> =
                        output.name_fields.iter().map(|&f| record.get(f)).collect();
                    let name = entry_name(
                        &output.prefix,
                        position,
                        &fields,
                        output.field_max_len,
                        output.format.extension(),
                    );
                    entries.push((name, bytes));
                }
                Err(e) => {
                    warn!(row = record.source_row, error = %e, "template instance failed");
                    failures.push(RecordFailure::from_error(record, &e));
                }
            }
        }

        if entries.is_empty() {
            return Err(EtiquetteError::Render(format!(
                "none of the {} template instance(s) could be rendered",
                batch.records.len()
            )));
        }
        if !missing.is_empty() {
            warn!(slots = ?missing, "template is missing bound slots");
        }

        let bytes = build_archive(&entries)?;
        info!(files = entries.len(), failed = failures.len(), "archive assembled");
        Ok(Artifact {
            bytes,
            report: BatchReport {
                filter: batch.report.clone(),
                failures,
                rendered: entries.len(),
                pages: entries.len(),
                missing_slots: missing.into_iter().collect(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::{EncodedSymbol, Symbology};
    use crate::input::Row;
    use image::{Rgb, RgbImage};
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Read};

    /// Renderer that skips markup rasterization and records what it saw.
    struct StubRenderer;

    impl MarkupRenderer for StubRenderer {
        fn render(&self, markup: &str, _dpi: u32) -> Result<RgbImage> {
            if markup.contains("FAIL") {
                return Err(EtiquetteError::Render("stub failure".to_string()));
            }
            Ok(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])))
        }
    }

    /// Encoder that rejects one payload.
    struct PickyEncoder;

    impl BarcodeEncoder for PickyEncoder {
        fn encode(&self, symbology: Symbology, data: &str) -> Result<EncodedSymbol> {
            if data == "590123412345" {
                return Err(EtiquetteError::InvalidBarcode {
                    payload: data.to_string(),
                    reason: "refused".to_string(),
                });
            }
            BarcodersEncoder.encode(symbology, data)
        }
    }

    const TEMPLATE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="80mm" height="50mm"><text id="STYLE_NAME" x="4" y="8">Style</text><text id="SIZE_VALUE" x="4" y="20">S</text><g id="BARCODE_SLOT"/></svg>"#;

    fn table(rows: &[(&str, &str, &str)]) -> Table {
        let columns = vec!["Style".to_string(), "Size".to_string(), "EAN".to_string()];
        let rows = rows
            .iter()
            .map(|(style, size, ean)| {
                let mut row = Row::new();
                row.insert("Style".to_string(), style.to_string());
                row.insert("Size".to_string(), size.to_string());
                row.insert("EAN".to_string(), ean.to_string());
                row
            })
            .collect();
        Table { columns, rows }
    }

    fn assembler() -> Assembler {
        Assembler::new(LabelConfig::default())
            .with_fonts(FontCache::bitmap_only())
            .with_renderer(Arc::new(StubRenderer))
            .with_template(TemplateDocument::parse(TEMPLATE).unwrap())
    }

    fn prepare(assembler: &Assembler, table: &Table) -> Result<PreparedBatch> {
        let mapping = resolve_mapping(table, &HashMap::new())?;
        assembler.prepare(table, mapping)
    }

    #[test]
    fn test_prepare_rejects_oversized_layout() {
        let mut config = LabelConfig::default();
        config.layout.label_width_mm = 254_000_000.0;
        config.layout.gutter_mm = 200_000_000.0;
        let assembler = Assembler::new(config).with_fonts(FontCache::bitmap_only());
        let err = prepare(&assembler, &table(&[("A", "M", "4006381333931")])).unwrap_err();
        assert!(matches!(err, EtiquetteError::Config(_)));
    }

    #[test]
    fn test_prepare_distinguishes_empty_reasons() {
        let assembler = assembler();
        let err = prepare(&assembler, &table(&[])).unwrap_err();
        assert!(matches!(err, EtiquetteError::EmptyBatch(EmptyBatchReason::NoInput)));

        let err = prepare(&assembler, &table(&[("A", "M", "123"), ("B", "L", "")])).unwrap_err();
        assert!(matches!(
            err,
            EtiquetteError::EmptyBatch(EmptyBatchReason::AllRowsInvalid { rejected: 2 })
        ));
    }

    #[test]
    fn test_prepare_reports_filtered_rows() {
        let assembler = assembler();
        let batch = prepare(
            &assembler,
            &table(&[("A", "M", "4006381333931"), ("B", "L", "bogus")]),
        )
        .unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.report.total, 2);
        assert_eq!(batch.report.rejected[0].index, 1);
    }

    #[test]
    fn test_raster_pdf_partial_success() {
        let assembler = assembler().with_encoder(Arc::new(PickyEncoder));
        let batch = prepare(
            &assembler,
            &table(&[("A", "M", "4006381333931"), ("B", "L", "5901234123457")]),
        )
        .unwrap();
        let artifact = assembler.raster_pdf(&batch).unwrap();
        assert!(artifact.bytes.starts_with(b"%PDF"));
        assert_eq!(artifact.report.rendered, 1);
        assert_eq!(artifact.report.pages, 1);
        assert_eq!(artifact.report.failures.len(), 1);
        assert_eq!(artifact.report.failures[0].index, 1);
        assert_eq!(artifact.report.failures[0].field, Some(Field::Barcode));
    }

    #[test]
    fn test_raster_pdf_all_failed_is_fatal() {
        let assembler = assembler().with_encoder(Arc::new(PickyEncoder));
        let batch = prepare(&assembler, &table(&[("B", "L", "5901234123457")])).unwrap();
        assert!(matches!(assembler.raster_pdf(&batch), Err(EtiquetteError::Render(_))));
    }

    #[test]
    fn test_preview_counts_pages_and_warns() {
        let assembler = assembler();
        let rows: Vec<(&str, &str, &str)> = (0..12)
            .map(|_| ("Hoodie", "XL", "3607186681381"))
            .chain(std::iter::once(("Bad", "S", "1234")))
            .collect();
        let batch = prepare(&assembler, &table(&rows)).unwrap();
        let preview = assembler.preview(&batch).unwrap();
        assert!(preview.png.starts_with(b"\x89PNG"));
        assert_eq!(preview.report.pages, 2);
        assert_eq!(preview.report.rendered, 10);
        let warnings = preview.report.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("row 13:"));
    }

    #[test]
    fn test_template_archive_names_and_failures() {
        let assembler = assembler();
        let batch = prepare(
            &assembler,
            &table(&[
                ("Hoodie", "XL", "3607186681381"),
                ("FAIL", "M", "4006381333931"),
                ("Polo Shirt", "L", "5901234123457"),
            ]),
        )
        .unwrap();
        let artifact = assembler.template_archive(&batch).unwrap();
        assert_eq!(artifact.report.rendered, 2);
        assert_eq!(artifact.report.failures.len(), 1);
        assert_eq!(artifact.report.failures[0].index, 1);
        assert!(artifact.report.missing_slots.contains(&"PRICE_VALUE".to_string()));

        let mut archive = zip::ZipArchive::new(Cursor::new(artifact.bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["label_0000_Hoodie_XL.png", "label_0002_Polo_Shirt_L.png"]
        );
        let mut png = Vec::new();
        archive.by_index(0).unwrap().read_to_end(&mut png).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
    }

    #[test]
    fn test_template_required_for_archive() {
        let assembler = Assembler::new(LabelConfig::default())
            .with_fonts(FontCache::bitmap_only())
            .with_renderer(Arc::new(StubRenderer));
        let batch = prepare(&assembler, &table(&[("A", "M", "4006381333931")])).unwrap();
        assert!(matches!(
            assembler.template_archive(&batch),
            Err(EtiquetteError::Config(_))
        ));
    }
}
