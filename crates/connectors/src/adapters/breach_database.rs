//! Breach-directory adapter.
//!
//! Returns which published breach corpora include a subject identifier.
//! Only breach metadata crosses the wire; the adapter never requests or
//! stores leaked secret material.

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::{SearchContext, SourceConnector};
use crate::transport::{HttpTransport, TransportRequest};
use async_trait::async_trait;
use osint_core::types::{EntityType, MediaType, Query, QueryKind, RawResult, SourceType};
use serde::Deserialize;
use std::sync::Arc;

const SOURCE_NAME: &str = "breach_directory";
const SUPPORTED: &[EntityType] = &[EntityType::Email, EntityType::Username];

#[derive(Debug, Deserialize)]
struct Breach {
    name: String,
    title: String,
    #[serde(default)]
    domain: Option<String>,
    breach_date: String,
    #[serde(default)]
    data_classes: Vec<String>,
    #[serde(default)]
    verified: bool,
}

pub struct BreachDirectoryConnector {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    api_key: Option<String>,
}

impl BreachDirectoryConnector {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: "https://breach.api.example/v3/breachedaccount".to_string(),
            transport,
            api_key: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn request(&self, url: String) -> TransportRequest {
        let mut request = TransportRequest::get(url);
        if let Some(key) = &self.api_key {
            request = request.with_header("x-api-key", key.clone());
        }
        request
    }
}

#[async_trait]
impl SourceConnector for BreachDirectoryConnector {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    fn source_type(&self) -> SourceType {
        SourceType::BreachDatabase
    }

    fn supported_entity_types(&self) -> &[EntityType] {
        SUPPORTED
    }

    fn rate_limit_per_hour(&self) -> u32 {
        60
    }

    fn base_confidence(&self) -> f64 {
        0.8
    }

    fn handles_kind(&self, kind: QueryKind) -> bool {
        matches!(kind, QueryKind::Email | QueryKind::Username)
    }

    async fn search(&self, query: &Query, ctx: &SearchContext) -> ConnectorResult<Vec<RawResult>> {
        ctx.check()?;
        let account = query.query_string.trim().to_ascii_lowercase();
        let url = format!("{}/{}", self.base_url, urlencoding::encode(&account));

        let response = self.transport.execute(self.request(url.clone()), ctx).await?;
        if response.status == 404 {
            // Directory convention: 404 means the account appears in no breach.
            return Ok(vec![]);
        }
        if response.status != 200 {
            return Err(ConnectorError::from_status(response.status));
        }

        let breaches: Vec<Breach> = serde_json::from_slice(&response.body)
            .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?;

        let results = breaches
            .into_iter()
            .map(|breach| {
                let mut result = RawResult::new(
                    query.query_id.clone(),
                    SOURCE_NAME,
                    format!("{}#{}", url, breach.name),
                    format!("Breach exposure: {}", breach.title),
                    serde_json::json!({
                        "name": breach.name,
                        "title": breach.title,
                        "domain": breach.domain,
                        "breach_date": breach.breach_date,
                        "data_classes": breach.data_classes,
                        "verified": breach.verified,
                    })
                    .to_string()
                    .into_bytes(),
                    MediaType::Json,
                )
                .with_metadata("breach_name", &breach.name)
                .with_metadata("breach_date", &breach.breach_date)
                .with_metadata("verified", breach.verified.to_string())
                .with_metadata("data_classes", breach.data_classes.join(","));
                if let Some(domain) = &breach.domain {
                    result = result.with_metadata("breach_domain", domain);
                }
                result
            })
            .collect();

        Ok(results)
    }

    async fn validate_credentials(&self) -> ConnectorResult<bool> {
        if self.api_key.is_none() {
            return Ok(false);
        }
        let ctx = SearchContext::new(std::time::Duration::from_secs(10));
        let url = format!("{}/probe@example.com", self.base_url);
        match self.transport.execute(self.request(url), &ctx).await {
            Ok(response) if response.status == 401 || response.status == 403 => Ok(false),
            Ok(_) => Ok(true),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{StaticTransport, TransportResponse};
    use std::time::Duration;

    #[tokio::test]
    async fn test_parses_breach_listing() {
        let body = r#"[
            {"name": "ExampleForum2019", "title": "Example Forum",
             "domain": "forum.example", "breach_date": "2019-06-01",
             "data_classes": ["Email addresses", "Passwords"], "verified": true}
        ]"#;
        let transport = Arc::new(
            StaticTransport::new().with_response("breach.api", TransportResponse::ok_json(body)),
        );
        let connector = BreachDirectoryConnector::new(transport).with_api_key("k");
        let ctx = SearchContext::new(Duration::from_secs(5));

        let results = connector
            .search(&Query::new("bob@example.com", QueryKind::Email), &ctx)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].metadata.get("breach_name").map(String::as_str),
            Some("ExampleForum2019")
        );
        assert_eq!(
            results[0].metadata.get("verified").map(String::as_str),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_clean_account_yields_no_results() {
        let connector = BreachDirectoryConnector::new(Arc::new(StaticTransport::new()));
        let ctx = SearchContext::new(Duration::from_secs(5));

        let results = connector
            .search(&Query::new("clean@example.com", QueryKind::Email), &ctx)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_fails_validation() {
        let connector = BreachDirectoryConnector::new(Arc::new(StaticTransport::new()));
        assert!(!connector.validate_credentials().await.unwrap());
    }
}
