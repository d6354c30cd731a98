//! Server state and configuration.

use crate::config::LabelConfig;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen_addr: String,
    /// Defaults applied to every request; requests may override the layout.
    pub labels: LabelConfig,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn new(listen_addr: impl Into<String>, labels: LabelConfig) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            labels,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Application state shared across handlers.
///
/// Holds configuration only; every request builds its own assembler, so no
/// caches outlive a batch.
pub struct AppState {
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }
}
