//! Code-hosting account search adapter.

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::{SearchContext, SourceConnector};
use crate::transport::{HttpTransport, TransportRequest};
use async_trait::async_trait;
use osint_core::types::{EntityType, MediaType, Query, RawResult, SourceType};
use serde::Deserialize;
use std::sync::Arc;

const SOURCE_NAME: &str = "code_hosting";
const SUPPORTED: &[EntityType] = &[
    EntityType::Username,
    EntityType::Email,
    EntityType::Person,
];

#[derive(Debug, Deserialize)]
struct AccountSearchEnvelope {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    items: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct Account {
    login: String,
    html_url: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

pub struct CodeRepositoryConnector {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    api_token: Option<String>,
}

impl CodeRepositoryConnector {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: "https://code.api.example/search/users".to_string(),
            transport,
            api_token: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    fn request(&self, url: String) -> TransportRequest {
        let mut request = TransportRequest::get(url);
        if let Some(token) = &self.api_token {
            request = request.with_header("authorization", format!("Bearer {}", token));
        }
        request
    }
}

#[async_trait]
impl SourceConnector for CodeRepositoryConnector {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    fn source_type(&self) -> SourceType {
        SourceType::CodeRepository
    }

    fn supported_entity_types(&self) -> &[EntityType] {
        SUPPORTED
    }

    fn rate_limit_per_hour(&self) -> u32 {
        60
    }

    fn base_confidence(&self) -> f64 {
        0.85
    }

    async fn search(&self, query: &Query, ctx: &SearchContext) -> ConnectorResult<Vec<RawResult>> {
        ctx.check()?;
        let url = format!(
            "{}?q={}",
            self.base_url,
            urlencoding::encode(query.query_string.trim())
        );

        let response = self.transport.execute(self.request(url), ctx).await?;
        if response.status != 200 {
            return Err(ConnectorError::from_status(response.status));
        }

        let envelope: AccountSearchEnvelope = serde_json::from_slice(&response.body)
            .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?;

        let results = envelope
            .items
            .into_iter()
            .map(|account| {
                let body = serde_json::json!({
                    "login": account.login,
                    "name": account.name,
                    "company": account.company,
                    "email": account.email,
                    "location": account.location,
                    "created_at": account.created_at,
                });
                let mut result = RawResult::new(
                    query.query_id.clone(),
                    SOURCE_NAME,
                    account.html_url,
                    format!("Code hosting account {}", account.login),
                    body.to_string().into_bytes(),
                    MediaType::Json,
                )
                .with_metadata("username", &account.login)
                .with_metadata("total_count", envelope.total_count.to_string());
                if let Some(email) = &account.email {
                    result = result.with_metadata("email", email);
                }
                if let Some(company) = &account.company {
                    result = result.with_metadata("company", company);
                }
                result
            })
            .collect();

        Ok(results)
    }

    async fn validate_credentials(&self) -> ConnectorResult<bool> {
        if self.api_token.is_none() {
            // Anonymous access works with the public budget.
            return Ok(true);
        }
        let ctx = SearchContext::new(std::time::Duration::from_secs(10));
        let url = format!("{}?q=octocat&per_page=1", self.base_url);
        match self.transport.execute(self.request(url), &ctx).await {
            Ok(response) if response.status == 200 => Ok(true),
            Ok(response) if response.status == 401 || response.status == 403 => Ok(false),
            Ok(response) => Err(ConnectorError::from_status(response.status)),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{StaticTransport, TransportResponse};
    use osint_core::types::QueryKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_parses_accounts() {
        let body = r#"{"total_count": 1, "items": [
            {"login": "aroe", "html_url": "https://code.example/aroe",
             "name": "Alice Roe", "company": "Example Corp",
             "email": "alice@aroe.example", "created_at": "2014-07-01T00:00:00Z"}
        ]}"#;
        let transport = Arc::new(
            StaticTransport::new().with_response("code.api", TransportResponse::ok_json(body)),
        );
        let connector = CodeRepositoryConnector::new(transport);
        let ctx = SearchContext::new(Duration::from_secs(5));

        let results = connector
            .search(&Query::new("aroe", QueryKind::Username), &ctx)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].metadata.get("email").map(String::as_str),
            Some("alice@aroe.example")
        );
    }

    #[tokio::test]
    async fn test_bad_token_reports_invalid_credentials() {
        let transport = Arc::new(
            StaticTransport::new().with_response("code.api", TransportResponse::status(401)),
        );
        let connector = CodeRepositoryConnector::new(transport).with_api_token("expired");

        let valid = connector.validate_credentials().await.unwrap();
        assert!(!valid);
    }

    #[tokio::test]
    async fn test_forbidden_search_is_credentials_error() {
        let transport = Arc::new(
            StaticTransport::new().with_response("code.api", TransportResponse::status(403)),
        );
        let connector = CodeRepositoryConnector::new(transport);
        let ctx = SearchContext::new(Duration::from_secs(5));

        let result = connector
            .search(&Query::new("aroe", QueryKind::Username), &ctx)
            .await;
        assert!(matches!(result, Err(ConnectorError::CredentialsInvalid)));
    }
}
