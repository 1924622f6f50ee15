//! Connector registry introspection.

use crate::state::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use osint_connectors::ConnectorDescriptor;

pub fn connector_routes() -> Router<AppState> {
    Router::new().route("/", get(list_connectors))
}

async fn list_connectors(State(state): State<AppState>) -> Json<Vec<ConnectorDescriptor>> {
    Json(state.registry.descriptors())
}
