//! # HTTP Server for Label Generation
//!
//! Exposes the label pipeline as a small JSON/multipart API.
//!
//! ## Usage
//!
//! ```bash
//! etiquette serve --listen 0.0.0.0:8080 --config labels.json
//! ```
//!
//! | Route | Body | Response |
//! |-------|------|----------|
//! | `POST /api/labels/mapping` | `{"columns": [...]}` | guessed field → column mapping |
//! | `POST /api/labels/preview` | `{"rows": [...], "mapping"?, "overrides"?, "layout"?}` | JSON report with `png_base64` |
//! | `POST /api/labels/pdf` | same as preview | `application/pdf` |
//! | `POST /api/labels/upload` | multipart `file` (+ `overrides`) | `application/pdf` |

mod handlers;
mod state;

pub use state::{AppState, ServerConfig};

use axum::{Router, extract::DefaultBodyLimit, routing::post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{EtiquetteError, Result};

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/api/labels/mapping", post(handlers::labels::mapping))
        .route("/api/labels/preview", post(handlers::labels::preview))
        .route("/api/labels/pdf", post(handlers::labels::pdf))
        .route(
            "/api/labels/upload",
            post(handlers::labels::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use etiquette::config::LabelConfig;
/// use etiquette::server::{serve, ServerConfig};
///
/// # async fn example() -> etiquette::error::Result<()> {
/// serve(ServerConfig::new("0.0.0.0:8080", LabelConfig::default())).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig) -> Result<()> {
    let listen_addr = config.listen_addr.clone();
    let app = router(Arc::new(AppState::new(config)));

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .map_err(|e| {
            EtiquetteError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}", listen_addr, e),
            ))
        })?;
    info!(addr = %listen_addr, "etiquette HTTP server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
