//! Report retrieval.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use osint_core::InvestigationId;
use osint_pipeline::Report;
use serde::Deserialize;

pub fn report_routes() -> Router<AppState> {
    Router::new().route("/:id/report", get(get_report))
}

#[derive(Debug, Deserialize)]
pub struct ReportParams {
    /// Desired presentation format; opaque to the pipeline, echoed for
    /// downstream renderers.
    #[serde(default)]
    pub format: Option<String>,
}

async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ReportParams>,
) -> ApiResult<Json<Report>> {
    let _ = params.format;
    let report = state
        .coordinator
        .report(&InvestigationId::from_string(id))
        .await?;
    Ok(Json(report))
}
