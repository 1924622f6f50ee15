use chrono::{DateTime, Utc};
use osint_core::{Error, InvestigationId, QueryId};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Subject identifiers supplied by the client. These bound the
/// investigation; nothing outside the seed (and what it transitively
/// surfaces) is queried.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SeedInput {
    #[validate(length(min = 1, max = 200, message = "full_name is required"))]
    pub full_name: String,

    #[validate(length(max = 20), custom(function = "validate_usernames"))]
    #[serde(default)]
    pub usernames: Vec<String>,

    #[validate(length(max = 10), custom(function = "validate_emails"))]
    #[serde(default)]
    pub emails: Vec<String>,

    /// E.164 formatted phone numbers
    #[validate(length(max = 5), custom(function = "validate_phones"))]
    #[serde(default)]
    pub phone_numbers: Vec<String>,

    #[validate(nested)]
    #[serde(default)]
    pub geographic_hints: Option<GeographicHints>,

    #[validate(nested)]
    #[serde(default)]
    pub professional_hints: Option<ProfessionalHints>,

    #[validate(length(max = 10), custom(function = "validate_domains"))]
    #[serde(default)]
    pub known_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GeographicHints {
    #[validate(length(max = 100))]
    #[serde(default)]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub region: Option<String>,
    /// ISO 3166-1 alpha-2
    #[validate(length(equal = 2))]
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProfessionalHints {
    #[validate(length(max = 200))]
    #[serde(default)]
    pub employer: Option<String>,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub industry: Option<String>,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub title: Option<String>,
}

fn validate_emails(emails: &[String]) -> Result<(), ValidationError> {
    use validator::ValidateEmail;
    for email in emails {
        if !email.as_str().validate_email() {
            let mut err = ValidationError::new("email_format");
            err.message = Some(format!("invalid email address: {}", email).into());
            return Err(err);
        }
    }
    Ok(())
}

fn validate_phones(phones: &[String]) -> Result<(), ValidationError> {
    for phone in phones {
        let digits = phone.strip_prefix('+').unwrap_or(phone);
        let valid = phone.starts_with('+')
            && (7..=15).contains(&digits.len())
            && digits.chars().all(|c| c.is_ascii_digit());
        if !valid {
            let mut err = ValidationError::new("phone_format");
            err.message = Some(format!("phone must be E.164: {}", phone).into());
            return Err(err);
        }
    }
    Ok(())
}

fn validate_usernames(usernames: &[String]) -> Result<(), ValidationError> {
    for username in usernames {
        if username.is_empty() || username.len() > 80 {
            return Err(ValidationError::new("username_length"));
        }
    }
    Ok(())
}

fn validate_domains(domains: &[String]) -> Result<(), ValidationError> {
    for domain in domains {
        let plausible = domain.contains('.')
            && !domain.contains(char::is_whitespace)
            && domain.len() <= 253;
        if !plausible {
            let mut err = ValidationError::new("domain_format");
            err.message = Some(format!("not a plausible domain: {}", domain).into());
            return Err(err);
        }
    }
    Ok(())
}

/// Investigation constraints
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Constraints {
    /// Never extract medical / religious / financial-account attributes
    pub exclude_sensitive_attributes: bool,
    /// Never attempt identification of minors
    pub exclude_minors: bool,
    #[validate(range(min = 1, max = 10))]
    pub max_search_depth: u8,
    #[validate(range(min = 1, max = 365))]
    pub retention_days: u16,
    /// Wall-clock cap in minutes; `None` uses the configured default
    #[validate(range(min = 1, max = 360))]
    pub max_duration_min: Option<u64>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            exclude_sensitive_attributes: true,
            exclude_minors: true,
            max_search_depth: 2,
            retention_days: 90,
            max_duration_min: None,
        }
    }
}

/// Confidence thresholds, percentages in 0-100
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct Thresholds {
    #[validate(range(max = 100))]
    pub minimum_entity_confidence: u8,
    #[validate(range(max = 100))]
    pub minimum_source_confidence: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            minimum_entity_confidence: 70,
            minimum_source_confidence: 60,
        }
    }
}

/// Full submission payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InvestigationRequest {
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[validate(nested)]
    pub subject_identifiers: SeedInput,
    #[validate(nested)]
    #[serde(default)]
    pub constraints: Constraints,
    #[validate(nested)]
    #[serde(default)]
    pub thresholds: Thresholds,
}

/// Investigation lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestigationStatus {
    Created,
    Planning,
    Fetching,
    Parsing,
    Resolving,
    Reporting,
    Completed,
    Failed,
    Cancelled,
}

impl InvestigationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvestigationStatus::Completed
                | InvestigationStatus::Failed
                | InvestigationStatus::Cancelled
        )
    }

    /// Legal transitions. `fetching`, `parsing` and `resolving` are
    /// pipelined, so they may move between each other in both directions.
    pub fn can_transition_to(&self, next: InvestigationStatus) -> bool {
        use InvestigationStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed) | (_, Cancelled) => true,
            (Created, Planning) => true,
            (Planning, Fetching) => true,
            (Fetching, Parsing) | (Parsing, Fetching) => true,
            (Parsing, Resolving) | (Resolving, Parsing) => true,
            (Fetching, Resolving) | (Resolving, Fetching) => true,
            (Resolving, Reporting) | (Fetching, Reporting) | (Parsing, Reporting) => true,
            // An empty or fully rejected plan reports immediately.
            (Planning, Reporting) => true,
            (Reporting, Completed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvestigationStatus::Created => "created",
            InvestigationStatus::Planning => "planning",
            InvestigationStatus::Fetching => "fetching",
            InvestigationStatus::Parsing => "parsing",
            InvestigationStatus::Resolving => "resolving",
            InvestigationStatus::Reporting => "reporting",
            InvestigationStatus::Completed => "completed",
            InvestigationStatus::Failed => "failed",
            InvestigationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for InvestigationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-readable per-query or per-stage error entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationError {
    pub kind: String,
    pub source: Option<String>,
    pub query_id: Option<QueryId>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl InvestigationError {
    pub fn from_error(error: &Error) -> Self {
        Self {
            kind: error.code.kind().to_string(),
            source: error.context.source.clone(),
            query_id: error
                .context
                .query_id
                .clone()
                .map(QueryId::from_string),
            message: error.message.clone(),
            occurred_at: error.context.timestamp,
        }
    }
}

/// The investigation record: seed input plus live progress. Owned
/// exclusively by the coordinator until terminal state, then the store is
/// the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationRecord {
    pub investigation_id: InvestigationId,
    pub correlation_id: Option<String>,
    pub subject_identifiers: SeedInput,
    pub constraints: Constraints,
    pub thresholds: Thresholds,
    pub status: InvestigationStatus,
    pub progress_percentage: f32,
    pub current_stage: String,
    pub entities_found: usize,
    pub queries_planned: usize,
    pub queries_executed: usize,
    pub errors: Vec<InvestigationError>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl InvestigationRecord {
    pub fn new(request: InvestigationRequest) -> Self {
        Self {
            investigation_id: InvestigationId::new(),
            correlation_id: request.correlation_id,
            subject_identifiers: request.subject_identifiers,
            constraints: request.constraints,
            thresholds: request.thresholds,
            status: InvestigationStatus::Created,
            progress_percentage: 0.0,
            current_stage: InvestigationStatus::Created.as_str().to_string(),
            entities_found: 0,
            queries_planned: 0,
            queries_executed: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            estimated_completion: None,
        }
    }

    pub fn record_error(&mut self, error: &Error) {
        self.errors.push(InvestigationError::from_error(error));
    }
}

/// Progress events streamed to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventType {
    StatusUpdate,
    NewEntity,
    StageTransition,
    Error,
    Completion,
}

impl ProgressEventType {
    /// Critical events must never be dropped on a full channel.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            ProgressEventType::StageTransition | ProgressEventType::Completion
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub event_type: ProgressEventType,
    pub investigation_id: InvestigationId,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    /// Count of non-critical events dropped since the last delivery
    #[serde(default, skip_serializing_if = "is_zero")]
    pub dropped_events: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl ProgressEvent {
    pub fn new(
        event_type: ProgressEventType,
        investigation_id: InvestigationId,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_type,
            investigation_id,
            timestamp: Utc::now(),
            data,
            dropped_events: 0,
        }
    }
}

/// Discretization of final entity confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Unlikely,
    Possible,
    Probable,
    Verified,
}

impl VerificationStatus {
    pub fn from_confidence(confidence: u8) -> Self {
        match confidence {
            90..=100 => VerificationStatus::Verified,
            75..=89 => VerificationStatus::Probable,
            60..=74 => VerificationStatus::Possible,
            _ => VerificationStatus::Unlikely,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::Probable => "probable",
            VerificationStatus::Possible => "possible",
            VerificationStatus::Unlikely => "unlikely",
        }
    }
}
