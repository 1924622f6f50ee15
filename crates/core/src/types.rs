use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an investigation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvestigationId(pub String);

impl InvestigationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InvestigationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvestigationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a planned query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(pub String);

impl QueryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a raw result returned by a connector
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultId(pub String);

impl ResultId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ResultId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of search a planned query performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Name,
    Username,
    Email,
    Phone,
    Domain,
    Company,
    Location,
    Composite,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Name => "name",
            QueryKind::Username => "username",
            QueryKind::Email => "email",
            QueryKind::Phone => "phone",
            QueryKind::Domain => "domain",
            QueryKind::Company => "company",
            QueryKind::Location => "location",
            QueryKind::Composite => "composite",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A planned query: produced by the discovery planner, consumed by the
/// fetch scheduler, discarded once the raw result is cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub query_id: QueryId,
    pub query_string: String,
    pub kind: QueryKind,
    /// Ordered list of connector names this query targets
    pub target_connectors: Vec<String>,
    /// 0-100, higher runs first
    pub priority: u8,
    /// Opaque per-connector parameters; ordered map so fingerprints are stable
    pub parameters: BTreeMap<String, String>,
    /// Hop distance from the seed (0 = first round)
    pub depth: u8,
}

impl Query {
    pub fn new(query_string: impl Into<String>, kind: QueryKind) -> Self {
        Self {
            query_id: QueryId::new(),
            query_string: query_string.into(),
            kind,
            target_connectors: Vec::new(),
            priority: 50,
            parameters: BTreeMap::new(),
            depth: 0,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.min(100);
        self
    }

    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_connectors(mut self, connectors: Vec<String>) -> Self {
        self.target_connectors = connectors;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Media type of raw result content, used for parser dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Html,
    Json,
    Xml,
    Text,
    Other,
}

impl MediaType {
    /// Map a MIME type string to the parser dispatch class
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "text/html" | "application/xhtml+xml" => MediaType::Html,
            "application/json" | "application/ld+json" => MediaType::Json,
            "text/xml" | "application/xml" | "application/rss+xml" => MediaType::Xml,
            "text/plain" | "text/csv" | "text/markdown" => MediaType::Text,
            _ => MediaType::Other,
        }
    }
}

/// Security flags attached to raw results whose content tripped an
/// unsafe-content pattern. Flagged content is redacted, never dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityFlag {
    SqlInjection,
    CrossSiteScripting,
    CommandInjection,
    PathTraversal,
    OversizedContent,
}

/// The bytes and metadata returned by one connector for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResult {
    pub result_id: ResultId,
    pub query_id: QueryId,
    pub source_name: String,
    pub url: String,
    pub title: String,
    #[serde(with = "crate::utils::base64_bytes")]
    pub content: Vec<u8>,
    pub media_type: MediaType,
    pub metadata: BTreeMap<String, String>,
    pub retrieved_at: DateTime<Utc>,
    /// Hex SHA-256 of `content`; a pure function of the bytes
    pub content_hash: String,
    pub security_flags: Vec<SecurityFlag>,
}

impl RawResult {
    pub fn new(
        query_id: QueryId,
        source_name: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        content: Vec<u8>,
        media_type: MediaType,
    ) -> Self {
        let content_hash = crate::utils::sha256_hex(&content);
        Self {
            result_id: ResultId::new(),
            query_id,
            source_name: source_name.into(),
            url: url.into(),
            title: title.into(),
            content,
            media_type,
            metadata: BTreeMap::new(),
            retrieved_at: Utc::now(),
            content_hash,
            security_flags: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Replace the content with a redaction marker, keeping the original
    /// hash so the result stays traceable.
    pub fn redact(&mut self, flag: SecurityFlag) {
        if !self.security_flags.contains(&flag) {
            self.security_flags.push(flag);
        }
        self.content = b"[REDACTED]".to_vec();
    }

    pub fn is_flagged(&self) -> bool {
        !self.security_flags.is_empty()
    }
}

/// Source connector variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    SearchEngine,
    SocialMedia,
    CodeRepository,
    DomainRegistry,
    CertificateTransparency,
    BreachDatabase,
    Archive,
    CorporateRegistry,
    PatentRegistry,
    FundingRegistry,
    ThreatIntel,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::SearchEngine => "search_engine",
            SourceType::SocialMedia => "social_media",
            SourceType::CodeRepository => "code_repository",
            SourceType::DomainRegistry => "domain_registry",
            SourceType::CertificateTransparency => "certificate_transparency",
            SourceType::BreachDatabase => "breach_database",
            SourceType::Archive => "archive",
            SourceType::CorporateRegistry => "corporate_registry",
            SourceType::PatentRegistry => "patent_registry",
            SourceType::FundingRegistry => "funding_registry",
            SourceType::ThreatIntel => "threat_intel",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entity types recognized by the parser and resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Organization,
    Email,
    Phone,
    Username,
    Domain,
    SocialProfile,
    Location,
    Document,
    Event,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Organization => "organization",
            EntityType::Email => "email",
            EntityType::Phone => "phone",
            EntityType::Username => "username",
            EntityType::Domain => "domain",
            EntityType::SocialProfile => "social_profile",
            EntityType::Location => "location",
            EntityType::Document => "document",
            EntityType::Event => "event",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation() {
        let a = InvestigationId::new();
        let b = InvestigationId::new();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn test_media_type_dispatch() {
        assert_eq!(MediaType::from_mime("text/html; charset=utf-8"), MediaType::Html);
        assert_eq!(MediaType::from_mime("application/json"), MediaType::Json);
        assert_eq!(MediaType::from_mime("application/pdf"), MediaType::Other);
    }

    #[test]
    fn test_content_hash_is_pure() {
        let q = QueryId::new();
        let a = RawResult::new(
            q.clone(),
            "whois",
            "https://example.com",
            "t",
            b"same bytes".to_vec(),
            MediaType::Text,
        );
        let b = RawResult::new(
            q,
            "whois",
            "https://example.org",
            "u",
            b"same bytes".to_vec(),
            MediaType::Text,
        );
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_redaction_keeps_hash_and_flags() {
        let mut r = RawResult::new(
            QueryId::new(),
            "search",
            "https://example.com",
            "t",
            b"<script>alert(1)</script>".to_vec(),
            MediaType::Html,
        );
        let original_hash = r.content_hash.clone();
        r.redact(SecurityFlag::CrossSiteScripting);

        assert!(r.is_flagged());
        assert_eq!(r.content, b"[REDACTED]".to_vec());
        assert_eq!(r.content_hash, original_hash);
    }
}
