use osint_core::{Config, MetricsService};
use osint_pipeline::InvestigationCoordinator;
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub coordinator: Arc<InvestigationCoordinator>,
    pub metrics: Arc<MetricsService>,
    pub registry: Arc<osint_connectors::ConnectorRegistry>,
}
