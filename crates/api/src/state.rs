use std::sync::Arc;

use packforge_pipeline::{DemoFixtures, Exporter, JobOrchestrator};

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything heavy sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pool: packforge_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Owns every subject's job lifecycle.
    pub orchestrator: Arc<JobOrchestrator>,
    /// Pre-generated artifacts for the demo endpoints.
    pub fixtures: Arc<DemoFixtures>,
    /// Format export service; `None` when not configured.
    pub exporter: Option<Arc<dyn Exporter>>,
}
