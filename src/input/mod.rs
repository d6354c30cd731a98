//! # Tabular Input
//!
//! Loads rows × named columns from CSV, TSV, JSON or Excel sources.
//!
//! | Extension | Reader |
//! |-----------|--------|
//! | `.csv` | `csv`, comma separated, first row is the header |
//! | `.tsv` | `csv`, tab separated |
//! | `.json` | array of flat objects (`serde_json`) |
//! | `.xlsx`, `.xls` | first worksheet (`calamine`) |
//!
//! The extension is resolved once at the boundary; anything else is an
//! [`EtiquetteError::UnsupportedInputFormat`] before any row is read.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use serde_json::Value;
use tracing::debug;

use crate::error::{EtiquetteError, Result};
use crate::record::normalize_headers;

/// One raw input row: column name → cell text. Absent keys are missing cells.
pub type Row = HashMap<String, String>;

/// Rows plus the ordered column names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Where the input comes from.
#[derive(Debug, Clone)]
pub enum InputSource {
    /// A file on disk; the extension picks the reader.
    FilePath(PathBuf),
    /// Uploaded bytes; `name` carries the extension.
    InMemory { bytes: Vec<u8>, name: String },
}

impl InputSource {
    fn display_name(&self) -> String {
        match self {
            InputSource::FilePath(path) => path.display().to_string(),
            InputSource::InMemory { name, .. } => name.clone(),
        }
    }

    fn extension(&self) -> String {
        let name = match self {
            InputSource::FilePath(path) => path.as_path(),
            InputSource::InMemory { name, .. } => Path::new(name),
        };
        name.extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default()
    }

    fn bytes(&self) -> Result<Vec<u8>> {
        match self {
            InputSource::FilePath(path) => std::fs::read(path).map_err(|e| {
                EtiquetteError::Input(format!("failed to read {}: {}", path.display(), e))
            }),
            InputSource::InMemory { bytes, .. } => Ok(bytes.clone()),
        }
    }
}

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Tsv,
    Json,
    Excel,
}

fn detect_format(extension: &str) -> Result<Format> {
    match extension {
        ".csv" => Ok(Format::Csv),
        ".tsv" => Ok(Format::Tsv),
        ".json" => Ok(Format::Json),
        ".xlsx" | ".xls" => Ok(Format::Excel),
        "" => Err(EtiquetteError::UnsupportedInputFormat("(no extension)".to_string())),
        other => Err(EtiquetteError::UnsupportedInputFormat(other.to_string())),
    }
}

/// Load a table from any supported source.
pub fn load_table(source: &InputSource) -> Result<Table> {
    let format = detect_format(&source.extension())?;
    let bytes = source.bytes()?;
    let table = match format {
        Format::Csv => read_delimited(&bytes, b',')?,
        Format::Tsv => read_delimited(&bytes, b'\t')?,
        Format::Json => read_json(&bytes)?,
        Format::Excel => read_excel(bytes)?,
    };
    debug!(
        source = %source.display_name(),
        columns = table.columns.len(),
        rows = table.rows.len(),
        "loaded input table"
    );
    Ok(table)
}

fn is_blank(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}

/// Zip a header with rows of cells, skipping blank rows.
fn build_table(header: Vec<String>, body: impl Iterator<Item = Vec<String>>) -> Table {
    let columns = normalize_headers(&header);
    let rows = body
        .filter(|cells| !is_blank(cells))
        .map(|cells| {
            columns
                .iter()
                .zip(cells)
                .map(|(c, v)| (c.clone(), v))
                .collect()
        })
        .collect();
    Table { columns, rows }
}

fn read_delimited(bytes: &[u8], delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(bytes);

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| EtiquetteError::Input(format!("failed to read header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut body = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| EtiquetteError::Input(format!("row {}: {}", i + 1, e)))?;
        body.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    Ok(build_table(header, body.into_iter()))
}

/// Render a JSON scalar the way a spreadsheet user expects to see it.
fn json_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        }),
        other => Some(other.to_string()),
    }
}

fn read_json(bytes: &[u8]) -> Result<Table> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| EtiquetteError::Input(format!("invalid JSON: {}", e)))?;
    table_from_json(&value)
}

/// Build a table from a JSON array of flat objects.
///
/// Columns appear in first-seen order; null cells are left out.
pub fn table_from_json(value: &Value) -> Result<Table> {
    let items = value
        .as_array()
        .ok_or_else(|| EtiquetteError::Input("JSON input must be an array of objects".to_string()))?;

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let object = item.as_object().ok_or_else(|| {
            EtiquetteError::Input(format!("JSON item {} is not an object", i + 1))
        })?;
        let mut row = Row::new();
        for (key, value) in object {
            let key = key.trim().to_string();
            if !columns.contains(&key) {
                columns.push(key.clone());
            }
            if let Some(cell) = json_cell(value) {
                row.insert(key, cell);
            }
        }
        rows.push(row);
    }
    Ok(Table { columns, rows })
}

fn excel_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Integral floats are usually codes or sizes: no trailing ".0"
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR:{e:?}"),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

fn read_excel(bytes: Vec<u8>) -> Result<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| EtiquetteError::Input(format!("failed to open spreadsheet: {}", e)))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| EtiquetteError::Input("spreadsheet has no worksheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| EtiquetteError::Input(format!("failed to read sheet '{}': {}", sheet, e)))?;

    let mut rows = range.rows();
    let header = match rows.next() {
        Some(cells) => cells.iter().map(excel_cell).collect(),
        None => return Ok(Table::default()),
    };
    Ok(build_table(
        header,
        rows.map(|cells| cells.iter().map(excel_cell).collect()),
    ))
}
