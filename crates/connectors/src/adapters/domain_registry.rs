//! Domain-registry (WHOIS/RDAP) adapter.

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::{SearchContext, SourceConnector};
use crate::transport::{HttpTransport, TransportRequest};
use async_trait::async_trait;
use osint_core::types::{EntityType, MediaType, Query, QueryKind, RawResult, SourceType};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const SOURCE_NAME: &str = "whois_lookup";
const SUPPORTED: &[EntityType] = &[
    EntityType::Domain,
    EntityType::Person,
    EntityType::Organization,
    EntityType::Email,
];

/// Registration record envelope returned by the registry endpoint.
#[derive(Debug, Deserialize)]
struct WhoisEnvelope {
    domain: String,
    #[serde(default)]
    registrar: Option<String>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    registrant: Option<WhoisRegistrant>,
    #[serde(default)]
    nameservers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WhoisRegistrant {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    organization: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

pub struct WhoisConnector {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl WhoisConnector {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: "https://rdap.registry.example/v1/domain".to_string(),
            transport,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SourceConnector for WhoisConnector {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    fn source_type(&self) -> SourceType {
        SourceType::DomainRegistry
    }

    fn supported_entity_types(&self) -> &[EntityType] {
        SUPPORTED
    }

    fn rate_limit_per_hour(&self) -> u32 {
        100
    }

    fn base_confidence(&self) -> f64 {
        0.9
    }

    fn cache_ttl(&self) -> Option<Duration> {
        // Registration data moves slowly.
        Some(Duration::from_secs(6 * 3600))
    }

    fn handles_kind(&self, kind: QueryKind) -> bool {
        matches!(kind, QueryKind::Domain)
    }

    async fn search(&self, query: &Query, ctx: &SearchContext) -> ConnectorResult<Vec<RawResult>> {
        ctx.check()?;
        let domain = query.query_string.trim().to_ascii_lowercase();
        let url = format!("{}/{}", self.base_url, urlencoding::encode(&domain));

        let response = self
            .transport
            .execute(TransportRequest::get(url.clone()), ctx)
            .await?;
        if response.status == 404 {
            return Ok(vec![]);
        }
        if response.status != 200 {
            return Err(ConnectorError::from_status(response.status));
        }

        let envelope: WhoisEnvelope = serde_json::from_slice(&response.body)
            .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?;

        let mut result = RawResult::new(
            query.query_id.clone(),
            SOURCE_NAME,
            url,
            format!("Registration record for {}", envelope.domain),
            response.body.clone(),
            MediaType::Json,
        )
        .with_metadata("domain", &envelope.domain);

        if let Some(registrar) = &envelope.registrar {
            result = result.with_metadata("registrar", registrar);
        }
        if let Some(created) = &envelope.created {
            result = result.with_metadata("created", created);
        }
        if let Some(updated) = &envelope.updated {
            result = result.with_metadata("updated", updated);
        }
        if let Some(registrant) = &envelope.registrant {
            if let Some(name) = &registrant.name {
                result = result.with_metadata("registrant_name", name);
            }
            if let Some(org) = &registrant.organization {
                result = result.with_metadata("registrant_organization", org);
            }
            if let Some(email) = &registrant.email {
                result = result.with_metadata("registrant_email", email);
            }
            if let Some(country) = &registrant.country {
                result = result.with_metadata("registrant_country", country);
            }
        }
        if !envelope.nameservers.is_empty() {
            result = result.with_metadata("nameservers", envelope.nameservers.join(","));
        }

        Ok(vec![result])
    }

    async fn validate_credentials(&self) -> ConnectorResult<bool> {
        // Public registry endpoint, no credentials required.
        Ok(true)
    }
}
