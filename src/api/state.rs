//! Application state for the API server

use crate::{Config, ValidationPipeline};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the pipeline and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The validation pipeline
    pub pipeline: Arc<ValidationPipeline>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(pipeline: Arc<ValidationPipeline>, config: Arc<Config>) -> Self {
        Self { pipeline, config }
    }
}
