//! Corporate-registry adapter.

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::{SearchContext, SourceConnector};
use crate::transport::{HttpTransport, TransportRequest};
use async_trait::async_trait;
use osint_core::types::{EntityType, MediaType, Query, QueryKind, RawResult, SourceType};
use serde::Deserialize;
use std::sync::Arc;

const SOURCE_NAME: &str = "corporate_registry";
const SUPPORTED: &[EntityType] = &[EntityType::Organization, EntityType::Person];

#[derive(Debug, Deserialize)]
struct CompanySearchEnvelope {
    #[serde(default)]
    companies: Vec<Company>,
}

#[derive(Debug, Deserialize)]
struct Company {
    name: String,
    company_number: String,
    #[serde(default)]
    jurisdiction: Option<String>,
    #[serde(default)]
    incorporation_date: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    registry_url: Option<String>,
    #[serde(default)]
    officers: Vec<Officer>,
}

#[derive(Debug, Deserialize)]
struct Officer {
    name: String,
    #[serde(default)]
    position: Option<String>,
}

pub struct CorporateRegistryConnector {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl CorporateRegistryConnector {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: "https://corp.registry.example/v0/companies/search".to_string(),
            transport,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SourceConnector for CorporateRegistryConnector {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    fn source_type(&self) -> SourceType {
        SourceType::CorporateRegistry
    }

    fn supported_entity_types(&self) -> &[EntityType] {
        SUPPORTED
    }

    fn rate_limit_per_hour(&self) -> u32 {
        120
    }

    fn base_confidence(&self) -> f64 {
        0.85
    }

    fn handles_kind(&self, kind: QueryKind) -> bool {
        matches!(kind, QueryKind::Company | QueryKind::Name | QueryKind::Composite)
    }

    async fn search(&self, query: &Query, ctx: &SearchContext) -> ConnectorResult<Vec<RawResult>> {
        ctx.check()?;
        let mut url = format!(
            "{}?q={}",
            self.base_url,
            urlencoding::encode(query.query_string.trim())
        );
        if let Some(jurisdiction) = query.parameters.get("jurisdiction") {
            url.push_str(&format!(
                "&jurisdiction={}",
                urlencoding::encode(jurisdiction)
            ));
        }

        let response = self
            .transport
            .execute(TransportRequest::get(url), ctx)
            .await?;
        if response.status != 200 {
            return Err(ConnectorError::from_status(response.status));
        }

        let envelope: CompanySearchEnvelope = serde_json::from_slice(&response.body)
            .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?;

        let results = envelope
            .companies
            .into_iter()
            .map(|company| {
                let officer_names = company
                    .officers
                    .iter()
                    .map(|officer| match &officer.position {
                        Some(position) => format!("{} ({})", officer.name, position),
                        None => officer.name.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                let registry_url = company
                    .registry_url
                    .clone()
                    .unwrap_or_else(|| format!("registry://{}", company.company_number));

                let mut result = RawResult::new(
                    query.query_id.clone(),
                    SOURCE_NAME,
                    registry_url,
                    format!("Registry filing: {}", company.name),
                    serde_json::json!({
                        "name": company.name,
                        "company_number": company.company_number,
                        "jurisdiction": company.jurisdiction,
                        "incorporation_date": company.incorporation_date,
                        "status": company.status,
                        "officers": officer_names,
                    })
                    .to_string()
                    .into_bytes(),
                    MediaType::Json,
                )
                .with_metadata("company_name", &company.name)
                .with_metadata("company_number", &company.company_number);
                if let Some(jurisdiction) = &company.jurisdiction {
                    result = result.with_metadata("jurisdiction", jurisdiction);
                }
                if let Some(date) = &company.incorporation_date {
                    result = result.with_metadata("incorporation_date", date);
                }
                if !officer_names.is_empty() {
                    result = result.with_metadata("officers", officer_names);
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
    use std::time::Duration;

    #[tokio::test]
    async fn test_parses_company_filings() {
        let body = r#"{"companies": [
            {"name": "Roe Consulting LLC", "company_number": "201900123",
             "jurisdiction": "us_or", "incorporation_date": "2019-08-01",
             "status": "active",
             "officers": [{"name": "Alice Roe", "position": "member"}]}
        ]}"#;
        let transport = Arc::new(
            StaticTransport::new()
                .with_response("corp.registry", TransportResponse::ok_json(body)),
        );
        let connector = CorporateRegistryConnector::new(transport);
        let ctx = SearchContext::new(Duration::from_secs(5));

        let results = connector
            .search(&Query::new("Roe Consulting", QueryKind::Company), &ctx)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].metadata.get("officers").map(String::as_str),
            Some("Alice Roe (member)")
        );
    }

    #[tokio::test]
    async fn test_handles_company_and_name_kinds() {
        let connector = CorporateRegistryConnector::new(Arc::new(StaticTransport::new()));
        assert!(connector.handles_kind(QueryKind::Company));
        assert!(connector.handles_kind(QueryKind::Name));
        assert!(!connector.handles_kind(QueryKind::Phone));
    }
}
