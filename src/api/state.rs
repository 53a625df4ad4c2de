//! Application state for the API server

use crate::{Config, Wis2Downloader};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The running pipeline
    pub downloader: Arc<Wis2Downloader>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(downloader: Arc<Wis2Downloader>, config: Arc<Config>) -> Self {
        Self { downloader, config }
    }
}
