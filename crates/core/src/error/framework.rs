use super::{ErrorCode, ErrorContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Low priority errors that don't affect system functionality
    Low,
    /// Medium priority errors that may degrade an investigation
    Medium,
    /// High priority errors that affect core functionality
    High,
    /// Critical errors that require immediate attention
    Critical,
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    System,
    Source,
    Security,
    Validation,
    Request,
    Storage,
    Pipeline,
}

/// Main error type for the investigation pipeline
#[derive(Debug, ThisError, Clone)]
pub struct Error {
    /// Standardized error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional detailed description
    pub details: Option<String>,
    /// Error context for debugging
    pub context: ErrorContext,
    /// Error severity
    pub severity: ErrorSeverity,
    /// Optional cause chain
    pub cause: Option<Box<Error>>,
}

impl Error {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            context: ErrorContext::new(),
            severity: Self::default_severity_for_code(code),
            cause: None,
        }
    }

    /// Create error with details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Set error context
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    /// Set error severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Chain with another error as cause
    pub fn with_cause(mut self, cause: Error) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Attribute the error to a source connector
    pub fn with_source_name(mut self, source: impl Into<String>) -> Self {
        self.context.source = Some(source.into());
        self
    }

    /// Attribute the error to a query
    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.context.query_id = Some(query_id.into());
        self
    }

    /// Add trace to context
    pub fn add_trace(mut self, trace: impl Into<String>) -> Self {
        self.context = self.context.add_trace(trace.into());
        self
    }

    /// Add metadata to context
    pub fn add_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.add_metadata(key.into(), value);
        self
    }

    /// Get HTTP status code
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self.code.category() {
            "system" => ErrorCategory::System,
            "source" => ErrorCategory::Source,
            "security" => ErrorCategory::Security,
            "validation" => ErrorCategory::Validation,
            "request" => ErrorCategory::Request,
            "storage" => ErrorCategory::Storage,
            "pipeline" => ErrorCategory::Pipeline,
            _ => ErrorCategory::System,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Check if should be logged as error level
    pub fn should_log_as_error(&self) -> bool {
        self.code.should_log_as_error()
            || matches!(self.severity, ErrorSeverity::High | ErrorSeverity::Critical)
    }

    /// Convert to JSON for API responses
    pub fn to_api_response(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.code,
                "kind": self.code.kind(),
                "message": self.message,
                "details": self.details,
                "error_id": self.context.error_id,
                "correlation_id": self.context.correlation_id,
                "timestamp": self.context.timestamp
            }
        })
    }

    /// Convert to full debug JSON (for internal logging only)
    pub fn to_debug_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": self.details,
                "context": self.context,
                "severity": self.severity,
                "cause": self.cause.as_ref().map(|c| c.to_debug_json())
            }
        })
    }

    /// Get default severity for error code
    fn default_severity_for_code(code: ErrorCode) -> ErrorSeverity {
        match code {
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFormat
            | ErrorCode::ValueOutOfRange
            | ErrorCode::NotFound
            | ErrorCode::NotReady
            | ErrorCode::Cancelled => ErrorSeverity::Low,

            ErrorCode::RateLimited
            | ErrorCode::QueryTimeout
            | ErrorCode::MalformedResponse
            | ErrorCode::AlreadyExists
            | ErrorCode::Unauthorized
            | ErrorCode::ConcurrencyLimitExceeded => ErrorSeverity::Medium,

            ErrorCode::UpstreamUnavailable
            | ErrorCode::CredentialsInvalid
            | ErrorCode::ServiceUnavailable
            | ErrorCode::SecurityRejected
            | ErrorCode::UnsafeContent
            | ErrorCode::CacheError
            | ErrorCode::StoreUnavailable
            | ErrorCode::ResourceExhausted
            | ErrorCode::DeadlineExceeded => ErrorSeverity::High,

            ErrorCode::InternalError
            | ErrorCode::ConfigurationError
            | ErrorCode::StoreError
            | ErrorCode::SerializationError
            | ErrorCode::PlanningFailed
            | ErrorCode::ResolutionFailed
            | ErrorCode::ReportFailed
            | ErrorCode::ChannelClosed
            | ErrorCode::InvalidStateTransition
            | ErrorCode::ConnectorNotFound => ErrorSeverity::Critical,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct ErrorSer {
            code: ErrorCode,
            kind: &'static str,
            message: String,
            details: Option<String>,
            context: ErrorContext,
            severity: ErrorSeverity,
        }

        let error_ser = ErrorSer {
            code: self.code,
            kind: self.code.kind(),
            message: self.message.clone(),
            details: self.details.clone(),
            context: self.context.clone(),
            severity: self.severity,
        };

        error_ser.serialize(serializer)
    }
}

// Convenience constructors for common errors
impl Error {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotReady, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::QueryTimeout, message)
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, message)
    }

    pub fn credentials_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CredentialsInvalid, message)
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedResponse, message)
    }

    pub fn security_rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SecurityRejected, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, message)
    }
}

// Implement From for common error types
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationError, err.to_string())
            .add_trace("serde_json::Error conversion")
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::new(ErrorCode::ConfigurationError, err.to_string())
            .add_trace("config::ConfigError conversion")
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::QueryTimeout
        } else if err.is_connect() {
            ErrorCode::UpstreamUnavailable
        } else if err.is_decode() {
            ErrorCode::MalformedResponse
        } else if err.status().map(|s| s.as_u16()) == Some(429) {
            ErrorCode::RateLimited
        } else if err.status().map(|s| s.is_server_error()).unwrap_or(false) {
            ErrorCode::UpstreamUnavailable
        } else {
            ErrorCode::UpstreamUnavailable
        };

        Self::new(code, err.to_string()).add_trace("reqwest::Error conversion")
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        let code = match err.kind() {
            redis::ErrorKind::IoError => ErrorCode::StoreUnavailable,
            redis::ErrorKind::AuthenticationFailed => ErrorCode::CredentialsInvalid,
            redis::ErrorKind::TypeError | redis::ErrorKind::ExecAbortError => {
                ErrorCode::SerializationError
            }
            _ => ErrorCode::StoreError,
        };

        Self::new(code, err.to_string()).add_trace("redis::RedisError conversion")
    }
}
