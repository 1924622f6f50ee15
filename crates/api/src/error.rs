use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use osint_pipeline::PipelineError;
use serde_json::json;
use tracing::error;

/// Response-side wrapper around pipeline errors.
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if code.should_log_as_error() {
            error!(kind = code.kind(), error = %self.0, "request failed");
        }

        // 5xx bodies stay generic; the classified kind is enough for
        // clients and logs carry the detail.
        let message = if status.is_server_error() {
            "An internal error occurred".to_string()
        } else {
            self.0.to_string()
        };

        (
            status,
            Json(json!({
                "error": {
                    "kind": code.kind(),
                    "message": message,
                }
            })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError(PipelineError::InvestigationNotFound {
            id: "x".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_not_ready_maps_to_409() {
        let response = ApiError(PipelineError::ReportNotReady {
            id: "x".to_string(),
            status: "fetching".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_is_generic() {
        let response = ApiError(PipelineError::Internal {
            message: "secret detail".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
