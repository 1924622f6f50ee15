//! Web-archive (CDX) adapter.

use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::{SearchContext, SourceConnector};
use crate::transport::{HttpTransport, TransportRequest};
use async_trait::async_trait;
use osint_core::types::{EntityType, MediaType, Query, QueryKind, RawResult, SourceType};
use std::sync::Arc;

const SOURCE_NAME: &str = "web_archive";
const SUPPORTED: &[EntityType] = &[EntityType::Domain, EntityType::Document];

pub struct WebArchiveConnector {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    max_snapshots: usize,
}

impl WebArchiveConnector {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: "https://archive.api.example/cdx/search".to_string(),
            transport,
            max_snapshots: 50,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SourceConnector for WebArchiveConnector {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    fn source_type(&self) -> SourceType {
        SourceType::Archive
    }

    fn supported_entity_types(&self) -> &[EntityType] {
        SUPPORTED
    }

    fn rate_limit_per_hour(&self) -> u32 {
        300
    }

    fn base_confidence(&self) -> f64 {
        0.6
    }

    fn handles_kind(&self, kind: QueryKind) -> bool {
        matches!(kind, QueryKind::Domain)
    }

    async fn search(&self, query: &Query, ctx: &SearchContext) -> ConnectorResult<Vec<RawResult>> {
        ctx.check()?;
        let domain = query.query_string.trim().to_ascii_lowercase();
        let url = format!(
            "{}?url={}&matchType=domain&output=json&limit={}",
            self.base_url,
            urlencoding::encode(&domain),
            self.max_snapshots
        );

        let response = self
            .transport
            .execute(TransportRequest::get(url.clone()), ctx)
            .await?;
        if response.status != 200 {
            return Err(ConnectorError::from_status(response.status));
        }

        // CDX responses are a JSON array of rows, first row is the header.
        let rows: Vec<Vec<String>> = serde_json::from_slice(&response.body)
            .map_err(|e| ConnectorError::MalformedResponse(e.to_string()))?;
        if rows.len() < 2 {
            return Ok(vec![]);
        }

        let header = &rows[0];
        let timestamp_idx = header.iter().position(|h| h == "timestamp");
        let original_idx = header.iter().position(|h| h == "original");
        let (Some(timestamp_idx), Some(original_idx)) = (timestamp_idx, original_idx) else {
            return Err(ConnectorError::MalformedResponse(
                "CDX header missing timestamp/original columns".to_string(),
            ));
        };

        let snapshots = &rows[1..];
        let first_seen = snapshots
            .iter()
            .filter_map(|row| row.get(timestamp_idx))
            .min()
            .cloned()
            .unwrap_or_default();
        let last_seen = snapshots
            .iter()
            .filter_map(|row| row.get(timestamp_idx))
            .max()
            .cloned()
            .unwrap_or_default();
        let sample_url = snapshots
            .first()
            .and_then(|row| row.get(original_idx))
            .cloned()
            .unwrap_or_else(|| domain.clone());

        let result = RawResult::new(
            query.query_id.clone(),
            SOURCE_NAME,
            url,
            format!("Archive snapshots for {}", domain),
            response.body.clone(),
            MediaType::Json,
        )
        .with_metadata("domain", &domain)
        .with_metadata("snapshot_count", snapshots.len().to_string())
        .with_metadata("first_seen", first_seen)
        .with_metadata("last_seen", last_seen)
        .with_metadata("sample_url", sample_url);

        Ok(vec![result])
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
    async fn test_summarizes_snapshots() {
        let body = r#"[
            ["urlkey", "timestamp", "original", "mimetype", "statuscode"],
            ["example,aroe)/", "20190401000000", "https://aroe.example/", "text/html", "200"],
            ["example,aroe)/", "20230115120000", "https://aroe.example/", "text/html", "200"]
        ]"#;
        let transport = Arc::new(
            StaticTransport::new().with_response("archive.api", TransportResponse::ok_json(body)),
        );
        let connector = WebArchiveConnector::new(transport);
        let ctx = SearchContext::new(Duration::from_secs(5));

        let results = connector
            .search(&Query::new("aroe.example", QueryKind::Domain), &ctx)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let metadata = &results[0].metadata;
        assert_eq!(metadata.get("snapshot_count").map(String::as_str), Some("2"));
        assert_eq!(
            metadata.get("first_seen").map(String::as_str),
            Some("20190401000000")
        );
        assert_eq!(
            metadata.get("last_seen").map(String::as_str),
            Some("20230115120000")
        );
    }

    #[tokio::test]
    async fn test_header_only_response_is_empty() {
        let body = r#"[["urlkey", "timestamp", "original"]]"#;
        let transport = Arc::new(
            StaticTransport::new().with_response("archive.api", TransportResponse::ok_json(body)),
        );
        let connector = WebArchiveConnector::new(transport);
        let ctx = SearchContext::new(Duration::from_secs(5));

        let results = connector
            .search(&Query::new("quiet.example", QueryKind::Domain), &ctx)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
