//! HTTP transport seam between adapters and the network.
//!
//! Adapters speak `HttpTransport` so tests and offline runs can substitute
//! canned responses; production wiring uses [`ReqwestTransport`].

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::SearchContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn ok_json(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: "application/json".to_string(),
            body: body.into(),
        }
    }

    pub fn ok_html(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: "text/html".to_string(),
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            body: Vec::new(),
        }
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(
        &self,
        request: TransportRequest,
        ctx: &SearchContext,
    ) -> ConnectorResult<TransportResponse>;
}

/// Production transport backed by a shared reqwest client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("osint-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: TransportRequest,
        ctx: &SearchContext,
    ) -> ConnectorResult<TransportResponse> {
        ctx.check()?;
        let started = Instant::now();

        let mut builder = self
            .client
            .get(&request.url)
            .timeout(ctx.remaining());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(ConnectorError::Cancelled),
            result = builder.send() => result.map_err(|err| {
                if err.is_timeout() {
                    ConnectorError::Timeout {
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    }
                } else {
                    ConnectorError::from(err)
                }
            })?,
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let body = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(ConnectorError::Cancelled),
            bytes = response.bytes() => bytes.map_err(ConnectorError::from)?.to_vec(),
        };

        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Canned transport for tests and offline demos: maps URL substrings to
/// fixed responses. Unknown URLs answer 404.
pub struct StaticTransport {
    responses: HashMap<String, TransportResponse>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
        }
    }

    pub fn with_response(
        mut self,
        url_fragment: impl Into<String>,
        response: TransportResponse,
    ) -> Self {
        self.responses.insert(url_fragment.into(), response);
        self
    }
}

impl Default for StaticTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for StaticTransport {
    async fn execute(
        &self,
        request: TransportRequest,
        ctx: &SearchContext,
    ) -> ConnectorResult<TransportResponse> {
        ctx.check()?;
        for (fragment, response) in &self.responses {
            if request.url.contains(fragment.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(TransportResponse::status(404))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_static_transport_matches_fragment() {
        let transport = StaticTransport::new()
            .with_response("example.com", TransportResponse::ok_json(r#"{"ok":true}"#));
        let ctx = SearchContext::new(Duration::from_secs(5));

        let response = transport
            .execute(TransportRequest::get("https://api.example.com/v1"), &ctx)
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        let miss = transport
            .execute(TransportRequest::get("https://other.net"), &ctx)
            .await
            .unwrap();
        assert_eq!(miss.status, 404);
    }

    #[tokio::test]
    async fn test_static_transport_honors_cancel() {
        let transport = StaticTransport::new();
        let ctx = SearchContext::new(Duration::from_secs(5));
        ctx.cancel.cancel();

        let result = transport
            .execute(TransportRequest::get("https://example.com"), &ctx)
            .await;
        assert!(matches!(result, Err(ConnectorError::Cancelled)));
    }
}
