//! Label API handlers: column mapping, preview and PDF generation.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assemble::{Assembler, PreparedBatch, RecordFailure, resolve_mapping};
use crate::config::LabelConfig;
use crate::error::EtiquetteError;
use crate::input::{self, InputSource, Table};
use crate::layout::LayoutSpec;
use crate::record::{
    ColumnMapping, Field, RejectedRow, auto_guess_mapping, normalize_headers, parse_override,
};

use super::super::state::AppState;

type ApiError = (StatusCode, String);

fn api_error(e: EtiquetteError) -> ApiError {
    let status = match &e {
        EtiquetteError::EmptyBatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EtiquetteError::InvalidBarcode { .. }
        | EtiquetteError::MissingSlot { .. }
        | EtiquetteError::UnsupportedInputFormat(_)
        | EtiquetteError::Input(_)
        | EtiquetteError::Config(_)
        | EtiquetteError::Template(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %e, "request failed");
    }
    (status, e.to_string())
}

fn task_error(e: tokio::task::JoinError) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Task error: {}", e),
    )
}

/// Oversized uploads keep axum's 413.
fn multipart_error(e: MultipartError) -> ApiError {
    (e.status(), format!("Multipart error: {}", e.body_text()))
}

/// Body of POST /api/labels/mapping.
#[derive(Debug, Deserialize)]
pub struct MappingRequest {
    pub columns: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MappingResponse {
    pub columns: Vec<String>,
    pub mapping: ColumnMapping,
}

/// Body of the preview and PDF endpoints.
#[derive(Debug, Deserialize)]
pub struct LabelRequest {
    /// Array of flat objects, one per row
    pub rows: serde_json::Value,
    /// Complete mapping; guessed from the columns when absent
    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
    /// Per-field column overrides applied on top of the mapping
    #[serde(default)]
    pub overrides: HashMap<Field, String>,
    #[serde(default)]
    pub layout: Option<LayoutSpec>,
    #[serde(default)]
    pub allow_code128: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub pages: usize,
    pub kept: usize,
    pub rejected: Vec<RejectedRow>,
    pub failures: Vec<RecordFailure>,
    pub warnings: Vec<String>,
    pub png_base64: String,
}

/// Apply request overrides to the server defaults and coerce the rows.
fn prepare(
    defaults: &LabelConfig,
    table: &Table,
    mapping: Option<ColumnMapping>,
    overrides: &HashMap<Field, String>,
    layout: Option<LayoutSpec>,
    allow_code128: Option<bool>,
) -> Result<(Assembler, PreparedBatch), EtiquetteError> {
    let mut config = defaults.clone();
    if let Some(layout) = layout {
        config.layout = layout;
    }
    if let Some(allow) = allow_code128 {
        config.barcode.allow_code128 = allow;
    }
    config.validate()?;

    let mapping = match mapping {
        Some(mut mapping) => {
            mapping.apply_overrides(overrides, &table.columns)?;
            mapping.validate(&table.columns)?;
            mapping
        }
        None => resolve_mapping(table, overrides)?,
    };
    let assembler = Assembler::new(config);
    let batch = assembler.prepare(table, mapping)?;
    Ok((assembler, batch))
}

fn prepare_request(
    defaults: &LabelConfig,
    request: LabelRequest,
) -> Result<(Assembler, PreparedBatch), EtiquetteError> {
    let table = input::table_from_json(&request.rows)?;
    prepare(
        defaults,
        &table,
        request.mapping,
        &request.overrides,
        request.layout,
        request.allow_code128,
    )
}

fn pdf_response(bytes: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"labels.pdf\"",
            ),
        ],
        bytes,
    )
}

/// Handle POST /api/labels/mapping - guess a column mapping.
pub async fn mapping(Json(request): Json<MappingRequest>) -> Json<MappingResponse> {
    let columns = normalize_headers(&request.columns);
    let mapping = auto_guess_mapping(&columns);
    Json(MappingResponse { columns, mapping })
}

/// Handle POST /api/labels/preview - render the first page as PNG with a report.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LabelRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let defaults = state.config.labels.clone();

    let preview = tokio::task::spawn_blocking(move || {
        let (assembler, batch) = prepare_request(&defaults, request)?;
        assembler.preview(&batch)
    })
    .await
    .map_err(task_error)?
    .map_err(api_error)?;

    let report = preview.report;
    Ok(Json(PreviewResponse {
        pages: report.pages,
        kept: report.filter.kept,
        warnings: report.warnings(),
        rejected: report.filter.rejected,
        failures: report.failures,
        png_base64: STANDARD.encode(&preview.png),
    }))
}

/// Handle POST /api/labels/pdf - render every row into a PDF.
pub async fn pdf(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LabelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let defaults = state.config.labels.clone();

    let artifact = tokio::task::spawn_blocking(move || {
        let (assembler, batch) = prepare_request(&defaults, request)?;
        assembler.raster_pdf(&batch)
    })
    .await
    .map_err(task_error)?
    .map_err(api_error)?;

    info!(
        labels = artifact.report.rendered,
        pages = artifact.report.pages,
        "served PDF"
    );
    Ok(pdf_response(artifact.bytes))
}

/// Handle POST /api/labels/upload - spreadsheet upload straight to PDF.
///
/// Fields: `file` (required), `overrides` (optional, `FIELD=column` pairs
/// separated by commas or newlines).
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file: Option<(Vec<u8>, String)> = None;
    let mut overrides = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(multipart_error)?;
                file = Some((bytes.to_vec(), filename));
            }
            "overrides" => {
                let text = field
                    .text()
                    .await
                    .map_err(multipart_error)?;
                for pair in text.split([',', '\n']).map(str::trim).filter(|p| !p.is_empty()) {
                    let (field, column) = parse_override(pair).map_err(api_error)?;
                    overrides.insert(field, column);
                }
            }
            _ => {}
        }
    }

    let (bytes, name) =
        file.ok_or_else(|| (StatusCode::BAD_REQUEST, "No file provided".to_string()))?;
    info!(file = %name, size = bytes.len(), "upload received");
    let defaults = state.config.labels.clone();

    let artifact = tokio::task::spawn_blocking(move || {
        let table = input::load_table(&InputSource::InMemory { bytes, name })?;
        let (assembler, batch) = prepare(&defaults, &table, None, &overrides, None, None)?;
        assembler.raster_pdf(&batch)
    })
    .await
    .map_err(task_error)?
    .map_err(api_error)?;

    Ok(pdf_response(artifact.bytes))
}
