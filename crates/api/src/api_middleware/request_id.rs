//! Request ID middleware.
//!
//! Each request carries an identifier through its extensions and gets it
//! echoed on the response so clients can correlate. Incoming ids are
//! accepted from the canonical header or common tracing aliases when they
//! look sane; everything else gets a fresh UUID.

use axum::extract::Request;
use axum::http::header::HeaderValue;
use axum::http::HeaderName;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Headers an incoming id may arrive on, most specific first.
const ACCEPTED_HEADERS: &[&str] = &[REQUEST_ID_HEADER, "request-id", "x-correlation-id"];

/// Identifier attached to request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id =
        incoming_request_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    debug!(request_id = %request_id, status = %response.status(), "request finished");

    response
}

/// First accepted header whose value passes the sanity rule: 8-128 chars
/// of alphanumerics, hyphens, or underscores. UUIDs satisfy this without
/// a separate parse.
fn incoming_request_id(request: &Request) -> Option<String> {
    ACCEPTED_HEADERS
        .iter()
        .filter_map(|name| request.headers().get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|id| {
            (8..=128).contains(&id.len())
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn request_with(headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    /// Run one request through the middleware, returning the echoed id.
    async fn echoed_id(headers: &[(&str, &str)]) -> String {
        let app = Router::new()
            .route("/", get(|| async { "OK" }))
            .layer(axum::middleware::from_fn(request_id_middleware));
        let response = app.oneshot(request_with(headers)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get(REQUEST_ID_HEADER)
            .expect("echoed header")
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_request_id_generated_when_absent() {
        let id = echoed_id(&[]).await;
        assert!(Uuid::try_parse(&id).is_ok());
    }

    #[tokio::test]
    async fn test_existing_request_id_preserved() {
        let id = echoed_id(&[(REQUEST_ID_HEADER, "caller-chosen-id-7")]).await;
        assert_eq!(id, "caller-chosen-id-7");
    }

    #[test]
    fn test_header_precedence_and_sanity_rule() {
        // Canonical header wins over aliases.
        let request = request_with(&[
            ("x-correlation-id", "correlation-id-value"),
            (REQUEST_ID_HEADER, "canonical-id-value"),
        ]);
        assert_eq!(
            incoming_request_id(&request).as_deref(),
            Some("canonical-id-value")
        );

        // A garbage canonical value falls through to the next alias.
        let request = request_with(&[
            (REQUEST_ID_HEADER, "no@good"),
            ("request-id", "fallback-id-9"),
        ]);
        assert_eq!(
            incoming_request_id(&request).as_deref(),
            Some("fallback-id-9")
        );

        // Too short, too long, or bad characters all miss.
        let long = "a".repeat(129);
        for bad in ["abc", long.as_str(), "spaced id value"] {
            let request = request_with(&[(REQUEST_ID_HEADER, bad)]);
            assert_eq!(incoming_request_id(&request), None);
        }
    }
}
