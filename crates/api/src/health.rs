//! Health monitoring endpoints.
//!
//! `/health` is a liveness probe and always answers. `/ready` checks that
//! the connector registry is populated and the coordinator is accepting
//! work before declaring the service routable.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

/// Liveness probe: the process is up and serving.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = Object)
    ),
    tag = "health"
)]
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "osint-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe: dependencies are wired and the pipeline can accept
/// investigations.
#[utoipa::path(
    get,
    path = "/ready",
    responses(
        (status = 200, description = "Service is ready", body = Object),
        (status = 503, description = "Service is not ready", body = Object)
    ),
    tag = "health"
)]
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let connectors_registered = !state.registry.is_empty();
    let store_reachable = state.coordinator.list(1, 0).await.is_ok();

    let is_ready = connectors_registered && store_reachable;
    let status = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "ready": is_ready,
            "checks": {
                "connectors": connectors_registered,
                "store": store_reachable,
            }
        })),
    )
}
