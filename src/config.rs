//! # Configuration
//!
//! Batch settings, loaded from an optional JSON file. Every field has a
//! default, so `{}` is a valid configuration and partial files only need the
//! values they change.
//!
//! ```json
//! {
//!   "layout": { "cols": 3, "rows": 8, "label_width_mm": 63.5, "label_height_mm": 33.9 },
//!   "barcode": { "allow_code128": true },
//!   "template": { "path": "label.svg", "max_chars": 20 },
//!   "output": { "prefix": "spring", "format": "pdf" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EtiquetteError, Result};
use crate::layout::LayoutSpec;
use crate::record::{BarcodePolicy, Field};
use crate::template::{
    DEFAULT_LINE_STEP, DEFAULT_MAX_CHARS, FillStrategy, SlotBinding, default_bindings,
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub layout: LayoutSpec,
    pub barcode: BarcodeConfig,
    pub template: TemplateConfig,
    pub output: OutputConfig,
    pub fonts: FontConfig,
}

impl LabelConfig {
    /// Read a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EtiquetteError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| EtiquetteError::Config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.layout.validate()?;
        if !(self.barcode.width_fraction > 0.0 && self.barcode.width_fraction <= 1.0) {
            return Err(EtiquetteError::Config(format!(
                "barcode.width_fraction must be in (0, 1], got {}",
                self.barcode.width_fraction
            )));
        }
        if !(self.barcode.aspect > 0.0 && self.barcode.aspect <= 1.0) {
            return Err(EtiquetteError::Config(format!(
                "barcode.aspect must be in (0, 1], got {}",
                self.barcode.aspect
            )));
        }
        if self.output.field_max_len == 0 {
            return Err(EtiquetteError::Config(
                "output.field_max_len must be positive".to_string(),
            ));
        }
        if self.template.max_chars == 0 {
            return Err(EtiquetteError::Config(
                "template.max_chars must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Barcode gating and raster symbol geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodeConfig {
    /// Keep non-EAN payloads and encode them as Code 128.
    pub allow_code128: bool,
    /// Bar height as a fraction of the symbol width.
    pub aspect: f64,
    /// Symbol width as a fraction of the label width.
    pub width_fraction: f64,
    /// Gap between the symbol block and the label's bottom edge, at 300 dpi.
    pub bottom_padding_px: u32,
    /// Print the digits under the bars.
    pub human_readable: bool,
}

impl Default for BarcodeConfig {
    fn default() -> Self {
        Self {
            allow_code128: false,
            aspect: 0.35,
            width_fraction: 0.88,
            bottom_padding_px: 12,
            human_readable: true,
        }
    }
}

impl BarcodeConfig {
    pub fn policy(&self) -> BarcodePolicy {
        if self.allow_code128 {
            BarcodePolicy::AllowCode128
        } else {
            BarcodePolicy::Ean13Only
        }
    }
}

/// Template path settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub path: Option<PathBuf>,
    /// Explicit bindings; when absent the stock bindings are derived from the
    /// values below.
    pub bindings: Option<Vec<SlotBinding>>,
    pub line_step: String,
    pub max_chars: usize,
    pub barcode_width_mm: f64,
    pub barcode_height_mm: f64,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            path: None,
            bindings: None,
            line_step: DEFAULT_LINE_STEP.to_string(),
            max_chars: DEFAULT_MAX_CHARS,
            barcode_width_mm: 22.0,
            barcode_height_mm: 10.0,
        }
    }
}

impl TemplateConfig {
    /// Bindings in effect for this configuration.
    pub fn bindings(&self) -> Vec<SlotBinding> {
        if let Some(bindings) = &self.bindings {
            return bindings.clone();
        }
        default_bindings()
            .into_iter()
            .map(|mut binding| {
                binding.strategy = match binding.strategy {
                    FillStrategy::WrappedText { .. } => FillStrategy::WrappedText {
                        max_chars: self.max_chars,
                        line_step: self.line_step.clone(),
                    },
                    FillStrategy::Barcode { .. } => FillStrategy::Barcode {
                        width_mm: self.barcode_width_mm,
                        height_mm: self.barcode_height_mm,
                    },
                    FillStrategy::Text => FillStrategy::Text,
                };
                binding
            })
            .collect()
    }
}

/// Per-record artifact format on the template path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Pdf,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Pdf => "pdf",
        }
    }
}

/// Output naming and formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Archive entry prefix.
    pub prefix: String,
    /// Maximum characters kept per sanitized name field.
    pub field_max_len: usize,
    pub format: OutputFormat,
    /// Record fields appended to archive entry names.
    pub name_fields: Vec<Field>,
    /// Print prices with a decimal dot instead of a comma.
    pub dot_decimal_price: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: "label".to_string(),
            field_max_len: 24,
            format: OutputFormat::Png,
            name_fields: vec![Field::StyleName, Field::SizeValue],
            dot_decimal_price: false,
        }
    }
}

/// Font files for the raster path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub regular: Option<PathBuf>,
    pub bold: Option<PathBuf>,
    /// Look for DejaVu Sans in the usual system locations when no path is set.
    pub search_system: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            regular: None,
            bold: None,
            search_system: true,
        }
    }
}

impl FontConfig {
    /// Bitmap font only; never touches the filesystem.
    pub fn bitmap_only() -> Self {
        Self {
            regular: None,
            bold: None,
            search_system: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_json_is_default() {
        let config = LabelConfig::from_json("{}").unwrap();
        assert_eq!(config, LabelConfig::default());
        assert_eq!(config.layout.cols, 2);
        assert_eq!(config.barcode.policy(), BarcodePolicy::Ean13Only);
        assert_eq!(config.output.prefix, "label");
    }

    #[test]
    fn test_partial_sections() {
        let config = LabelConfig::from_json(
            r#"{"layout": {"cols": 3}, "barcode": {"allow_code128": true}, "output": {"format": "pdf"}}"#,
        )
        .unwrap();
        assert_eq!(config.layout.cols, 3);
        assert_eq!(config.layout.rows, 5);
        assert_eq!(config.barcode.policy(), BarcodePolicy::AllowCode128);
        assert!(config.barcode.human_readable);
        assert_eq!(config.output.format, OutputFormat::Pdf);
        assert_eq!(config.output.name_fields, vec![Field::StyleName, Field::SizeValue]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            LabelConfig::from_json(r#"{"layout": {"rows": 0}}"#),
            Err(EtiquetteError::Config(_))
        ));
        assert!(matches!(
            LabelConfig::from_json(r#"{"barcode": {"width_fraction": 1.5}}"#),
            Err(EtiquetteError::Config(_))
        ));
        assert!(matches!(
            LabelConfig::from_json("not json"),
            Err(EtiquetteError::Config(_))
        ));
    }

    #[test]
    fn test_template_bindings_follow_settings() {
        let template = TemplateConfig {
            max_chars: 16,
            barcode_width_mm: 30.0,
            ..Default::default()
        };
        let bindings = template.bindings();
        let style = bindings.iter().find(|b| b.field == Field::StyleName).unwrap();
        assert_eq!(
            style.strategy,
            FillStrategy::WrappedText {
                max_chars: 16,
                line_step: "4".to_string()
            }
        );
        let barcode = bindings.iter().find(|b| b.field == Field::Barcode).unwrap();
        assert_eq!(
            barcode.strategy,
            FillStrategy::Barcode {
                width_mm: 30.0,
                height_mm: 10.0
            }
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(&path, r#"{"output": {"prefix": "aw24"}}"#).unwrap();
        assert_eq!(LabelConfig::load(&path).unwrap().output.prefix, "aw24");
        assert!(LabelConfig::load(&dir.path().join("missing.json")).is_err());
    }
}
