use serde::{Deserialize, Serialize};
use std::fmt;

/// Standardized error codes for the investigation pipeline.
/// These are source-agnostic and represent technical error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // General System Errors (1000-1999)
    InternalError = 1000,
    ConfigurationError = 1001,
    ServiceUnavailable = 1002,
    DeadlineExceeded = 1003,
    ResourceExhausted = 1004,

    // Source & Connector Errors (2000-2999)
    RateLimited = 2000,
    QueryTimeout = 2001,
    UpstreamUnavailable = 2002,
    CredentialsInvalid = 2003,
    MalformedResponse = 2004,
    ConnectorNotFound = 2005,

    // Security Errors (3000-3999)
    SecurityRejected = 3000,
    UnsafeContent = 3001,

    // Input Validation Errors (4000-4999)
    ValidationFailed = 4000,
    InvalidInput = 4001,
    MissingRequiredField = 4002,
    InvalidFormat = 4003,
    ValueOutOfRange = 4004,

    // Request-Level Errors (5000-5999)
    NotFound = 5000,
    NotReady = 5001,
    Unauthorized = 5002,
    AlreadyExists = 5003,
    Cancelled = 5004,
    InvalidStateTransition = 5005,

    // Cache & Store Errors (6000-6999)
    CacheError = 6000,
    StoreError = 6001,
    StoreUnavailable = 6002,
    SerializationError = 6003,

    // Pipeline Errors (7000-7999)
    PlanningFailed = 7000,
    ResolutionFailed = 7001,
    ReportFailed = 7002,
    ChannelClosed = 7003,
    ConcurrencyLimitExceeded = 7004,
}

impl ErrorCode {
    /// Get HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        match self {
            // 500 - Internal Server Error
            ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::MalformedResponse
            | ErrorCode::SerializationError
            | ErrorCode::CacheError
            | ErrorCode::StoreError
            | ErrorCode::PlanningFailed
            | ErrorCode::ResolutionFailed
            | ErrorCode::ReportFailed
            | ErrorCode::ChannelClosed => 500,

            // 503 - Service Unavailable
            ErrorCode::ServiceUnavailable
            | ErrorCode::UpstreamUnavailable
            | ErrorCode::StoreUnavailable => 503,

            // 408 - Request Timeout
            ErrorCode::DeadlineExceeded | ErrorCode::QueryTimeout => 408,

            // 401 - Unauthorized
            ErrorCode::Unauthorized | ErrorCode::CredentialsInvalid => 401,

            // 403 - Forbidden
            ErrorCode::SecurityRejected | ErrorCode::UnsafeContent => 403,

            // 400 - Bad Request
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFormat
            | ErrorCode::ValueOutOfRange => 400,

            // 404 - Not Found
            ErrorCode::NotFound | ErrorCode::ConnectorNotFound => 404,

            // 409 - Conflict
            ErrorCode::AlreadyExists
            | ErrorCode::Cancelled
            | ErrorCode::InvalidStateTransition
            | ErrorCode::NotReady => 409,

            // 429 - Too Many Requests
            ErrorCode::RateLimited | ErrorCode::ConcurrencyLimitExceeded => 429,

            // 507 - Insufficient Storage
            ErrorCode::ResourceExhausted => 507,
        }
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::ServiceUnavailable
            | ErrorCode::DeadlineExceeded
            | ErrorCode::ResourceExhausted => "system",

            ErrorCode::RateLimited
            | ErrorCode::QueryTimeout
            | ErrorCode::UpstreamUnavailable
            | ErrorCode::CredentialsInvalid
            | ErrorCode::MalformedResponse
            | ErrorCode::ConnectorNotFound => "source",

            ErrorCode::SecurityRejected | ErrorCode::UnsafeContent => "security",

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFormat
            | ErrorCode::ValueOutOfRange => "validation",

            ErrorCode::NotFound
            | ErrorCode::NotReady
            | ErrorCode::Unauthorized
            | ErrorCode::AlreadyExists
            | ErrorCode::Cancelled
            | ErrorCode::InvalidStateTransition => "request",

            ErrorCode::CacheError
            | ErrorCode::StoreError
            | ErrorCode::StoreUnavailable
            | ErrorCode::SerializationError => "storage",

            ErrorCode::PlanningFailed
            | ErrorCode::ResolutionFailed
            | ErrorCode::ReportFailed
            | ErrorCode::ChannelClosed
            | ErrorCode::ConcurrencyLimitExceeded => "pipeline",
        }
    }

    /// Machine-readable error kind used in investigation error records
    /// and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::QueryTimeout | ErrorCode::DeadlineExceeded => "timeout",
            ErrorCode::UpstreamUnavailable | ErrorCode::ServiceUnavailable => {
                "upstream_unavailable"
            }
            ErrorCode::CredentialsInvalid => "credentials_invalid",
            ErrorCode::MalformedResponse => "malformed_response",
            ErrorCode::SecurityRejected | ErrorCode::UnsafeContent => "security_rejected",
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFormat
            | ErrorCode::ValueOutOfRange => "validation",
            ErrorCode::NotFound | ErrorCode::ConnectorNotFound => "not_found",
            ErrorCode::NotReady => "not_ready",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Cancelled => "cancelled",
            _ => "internal",
        }
    }

    /// Check if a query that failed with this code should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::QueryTimeout
                | ErrorCode::UpstreamUnavailable
                | ErrorCode::ServiceUnavailable
                | ErrorCode::CacheError
                | ErrorCode::StoreUnavailable
                | ErrorCode::ResourceExhausted
        )
    }

    /// Check if error should be logged at error level
    pub fn should_log_as_error(&self) -> bool {
        !matches!(
            self,
            ErrorCode::ValidationFailed
                | ErrorCode::InvalidInput
                | ErrorCode::MissingRequiredField
                | ErrorCode::InvalidFormat
                | ErrorCode::ValueOutOfRange
                | ErrorCode::NotFound
                | ErrorCode::NotReady
                | ErrorCode::Unauthorized
                | ErrorCode::Cancelled
                | ErrorCode::RateLimited
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
