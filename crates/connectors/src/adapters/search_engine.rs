//! General web-search adapter.

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::{SearchContext, SourceConnector};
use crate::transport::{HttpTransport, TransportRequest};
use async_trait::async_trait;
use osint_core::types::{EntityType, MediaType, Query, RawResult, SourceType};
use serde::Deserialize;
use std::sync::Arc;

const SOURCE_NAME: &str = "web_search";
const SUPPORTED: &[EntityType] = &[
    EntityType::Person,
    EntityType::Organization,
    EntityType::Email,
    EntityType::Username,
    EntityType::Domain,
    EntityType::Location,
];

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    url: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    published: Option<String>,
}

pub struct WebSearchConnector {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    max_results: usize,
}

impl WebSearchConnector {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: "https://search.api.example/v1/search".to_string(),
            transport,
            max_results: 25,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

#[async_trait]
impl SourceConnector for WebSearchConnector {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    fn source_type(&self) -> SourceType {
        SourceType::SearchEngine
    }

    fn supported_entity_types(&self) -> &[EntityType] {
        SUPPORTED
    }

    fn rate_limit_per_hour(&self) -> u32 {
        500
    }

    fn base_confidence(&self) -> f64 {
        0.5
    }

    async fn search(&self, query: &Query, ctx: &SearchContext) -> ConnectorResult<Vec<RawResult>> {
        ctx.check()?;
        let mut url = format!(
            "{}?q={}&count={}",
            self.base_url,
            urlencoding::encode(query.query_string.trim()),
            self.max_results
        );
        if let Some(site) = query.parameters.get("site") {
            url.push_str(&format!("&site={}", urlencoding::encode(site)));
        }

        let response = self
            .transport
            .execute(TransportRequest::get(url), ctx)
            .await?;
        if response.status != 200 {
            return Err(ConnectorError::from_status(response.status));
        }

        let envelope: SearchEnvelope = serde_json::from_slice(&response.body)
            .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?;

        let results = envelope
            .results
            .into_iter()
            .take(self.max_results)
            .map(|hit| {
                let mut result = RawResult::new(
                    query.query_id.clone(),
                    SOURCE_NAME,
                    hit.url,
                    hit.title,
                    hit.snippet.into_bytes(),
                    MediaType::Html,
                );
                if let Some(published) = hit.published {
                    result = result.with_metadata("published", published);
                }
                result
            })
            .collect();

        Ok(results)
    }

    async fn validate_credentials(&self) -> ConnectorResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{StaticTransport, TransportResponse};
    use osint_core::types::QueryKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_parses_hits_and_caps_count() {
        let body = r#"{"results": [
            {"title": "Alice Roe | Example Corp", "url": "https://example.com/a", "snippet": "Alice Roe is a staff engineer"},
            {"title": "aroe (Alice Roe)", "url": "https://social.example/aroe", "snippet": "@aroe joined 2015"}
        ]}"#;
        let transport = Arc::new(
            StaticTransport::new().with_response("search.api", TransportResponse::ok_json(body)),
        );
        let connector = WebSearchConnector::new(transport).with_max_results(1);
        let ctx = SearchContext::new(Duration::from_secs(5));

        let results = connector
            .search(&Query::new("Alice Roe", QueryKind::Name), &ctx)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Alice Roe | Example Corp");
        assert_eq!(results[0].media_type, MediaType::Html);
    }

    #[tokio::test]
    async fn test_rate_limit_status_maps() {
        let transport = Arc::new(
            StaticTransport::new().with_response("search.api", TransportResponse::status(429)),
        );
        let connector = WebSearchConnector::new(transport);
        let ctx = SearchContext::new(Duration::from_secs(5));

        let result = connector
            .search(&Query::new("anything", QueryKind::Name), &ctx)
            .await;
        assert!(matches!(result, Err(ConnectorError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_handles_all_primary_kinds() {
        let connector = WebSearchConnector::new(Arc::new(StaticTransport::new()));
        for kind in [
            QueryKind::Name,
            QueryKind::Email,
            QueryKind::Username,
            QueryKind::Domain,
            QueryKind::Company,
            QueryKind::Composite,
        ] {
            assert!(connector.handles_kind(kind), "kind {:?}", kind);
        }
    }
}
