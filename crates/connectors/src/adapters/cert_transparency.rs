//! Certificate-transparency log adapter.

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::{SearchContext, SourceConnector};
use crate::transport::{HttpTransport, TransportRequest};
use async_trait::async_trait;
use osint_core::types::{EntityType, MediaType, Query, QueryKind, RawResult, SourceType};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const SOURCE_NAME: &str = "cert_transparency";
const SUPPORTED: &[EntityType] = &[EntityType::Domain];

/// One log entry in the crt.sh-style response array.
#[derive(Debug, Deserialize)]
struct CertEntry {
    issuer_name: String,
    common_name: String,
    /// Newline-separated SAN entries
    #[serde(default)]
    name_value: String,
    not_before: String,
    not_after: String,
}

pub struct CertTransparencyConnector {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl CertTransparencyConnector {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: "https://ctlog.api.example/entries".to_string(),
            transport,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SourceConnector for CertTransparencyConnector {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    fn source_type(&self) -> SourceType {
        SourceType::CertificateTransparency
    }

    fn supported_entity_types(&self) -> &[EntityType] {
        SUPPORTED
    }

    fn rate_limit_per_hour(&self) -> u32 {
        120
    }

    fn base_confidence(&self) -> f64 {
        0.95
    }

    fn cache_ttl(&self) -> Option<Duration> {
        Some(Duration::from_secs(12 * 3600))
    }

    fn handles_kind(&self, kind: QueryKind) -> bool {
        matches!(kind, QueryKind::Domain)
    }

    async fn search(&self, query: &Query, ctx: &SearchContext) -> ConnectorResult<Vec<RawResult>> {
        ctx.check()?;
        let domain = query.query_string.trim().to_ascii_lowercase();
        let url = format!(
            "{}?q={}&output=json",
            self.base_url,
            urlencoding::encode(&domain)
        );

        let response = self
            .transport
            .execute(TransportRequest::get(url.clone()), ctx)
            .await?;
        if response.status != 200 {
            return Err(ConnectorError::from_status(response.status));
        }

        let entries: Vec<CertEntry> = serde_json::from_slice(&response.body)
            .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?;
        if entries.is_empty() {
            return Ok(vec![]);
        }

        // The log is one result: certificate history for the queried domain.
        let mut subdomains = BTreeSet::new();
        for entry in &entries {
            for name in entry.name_value.lines() {
                let name = name.trim().to_ascii_lowercase();
                if !name.is_empty() {
                    subdomains.insert(name);
                }
            }
        }

        let first = &entries[0];
        let result = RawResult::new(
            query.query_id.clone(),
            SOURCE_NAME,
            url,
            format!("Certificate history for {}", domain),
            response.body.clone(),
            MediaType::Json,
        )
        .with_metadata("domain", &domain)
        .with_metadata("certificate_count", entries.len().to_string())
        .with_metadata("issuer", &first.issuer_name)
        .with_metadata("common_name", &first.common_name)
        .with_metadata("earliest_not_before", &first.not_before)
        .with_metadata("latest_not_after", &first.not_after)
        .with_metadata(
            "subject_names",
            subdomains.into_iter().collect::<Vec<_>>().join(","),
        );

        Ok(vec![result])
    }

    async fn validate_credentials(&self) -> ConnectorResult<bool> {
        Ok(true)
    }
}
