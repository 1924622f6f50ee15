//! Investigation lifecycle endpoints.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use osint_core::InvestigationId;
use osint_pipeline::{InvestigationRecord, InvestigationRequest};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

pub fn investigation_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_investigation).get(list_investigations))
        .route(
            "/:id",
            get(get_investigation).delete(delete_investigation),
        )
        .route("/:id/cancel", post(cancel_investigation))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// Accept a new investigation. The pipeline starts immediately; the
/// response carries the identifiers needed to follow it.
async fn submit_investigation(
    State(state): State<AppState>,
    Json(request): Json<InvestigationRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let record = state.coordinator.submit(request).await?;
    info!(
        investigation_id = %record.investigation_id,
        subject = %record.subject_identifiers.full_name,
        "investigation accepted"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "investigation_id": record.investigation_id,
            "status": record.status.as_str(),
            "estimated_completion": record.estimated_completion,
        })),
    ))
}

async fn list_investigations(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<InvestigationRecord>>> {
    let limit = params.limit.min(100);
    let records = state.coordinator.list(limit, params.offset).await?;
    Ok(Json(records))
}

/// Full investigation record minus the report. The store answers for
/// terminal investigations whose working set is gone.
async fn get_investigation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<InvestigationRecord>> {
    let record = state
        .coordinator
        .status(&InvestigationId::from_string(id))
        .await?;
    Ok(Json(record))
}

async fn cancel_investigation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = InvestigationId::from_string(id);
    state.coordinator.cancel(&id).await?;
    Ok(Json(json!({ "investigation_id": id, "cancelled": true })))
}

async fn delete_investigation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = InvestigationId::from_string(id);
    let removed = state.coordinator.delete(&id).await?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError(osint_pipeline::PipelineError::InvestigationNotFound {
            id: id.as_str().to_string(),
        }))
    }
}
