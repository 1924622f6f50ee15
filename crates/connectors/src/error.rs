use osint_core::{Error, ErrorCode};
use thiserror::Error;

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

/// Failure modes a connector may surface. None of these are fatal to an
/// investigation; the scheduler classifies them into retry / defer / record.
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    #[error("rate limited by upstream{}", retry_after_sec.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after_sec: Option<u64> },

    #[error("query deadline exceeded after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("credentials rejected by upstream")]
    CredentialsInvalid,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("search cancelled")]
    Cancelled,
}

impl ConnectorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConnectorError::RateLimited { .. } => ErrorCode::RateLimited,
            ConnectorError::Timeout { .. } => ErrorCode::QueryTimeout,
            ConnectorError::UpstreamUnavailable(_) => ErrorCode::UpstreamUnavailable,
            ConnectorError::CredentialsInvalid => ErrorCode::CredentialsInvalid,
            ConnectorError::MalformedResponse(_) => ErrorCode::MalformedResponse,
            ConnectorError::Cancelled => ErrorCode::Cancelled,
        }
    }

    /// Transient errors are worth retrying; configurational ones are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorError::Timeout { .. } | ConnectorError::UpstreamUnavailable(_)
        )
    }

    /// Map an upstream HTTP status to the connector failure taxonomy.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ConnectorError::RateLimited {
                retry_after_sec: None,
            },
            401 | 403 => ConnectorError::CredentialsInvalid,
            500..=599 => {
                ConnectorError::UpstreamUnavailable(format!("upstream returned HTTP {}", status))
            }
            other => {
                ConnectorError::MalformedResponse(format!("unexpected HTTP status {}", other))
            }
        }
    }
}

impl From<ConnectorError> for Error {
    fn from(err: ConnectorError) -> Self {
        let message = err.to_string();
        let mut error = Error::new(err.code(), message);
        if let ConnectorError::RateLimited {
            retry_after_sec: Some(secs),
        } = err
        {
            error = error.add_metadata("retry_after_sec", serde_json::json!(secs));
        }
        error
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ConnectorError::Timeout { elapsed_ms: 0 }
        } else if err.is_connect() {
            ConnectorError::UpstreamUnavailable(err.to_string())
        } else if err.is_decode() {
            ConnectorError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ConnectorError::from_status(status.as_u16())
        } else {
            ConnectorError::UpstreamUnavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ConnectorError::from_status(429),
            ConnectorError::RateLimited { .. }
        ));
        assert!(matches!(
            ConnectorError::from_status(401),
            ConnectorError::CredentialsInvalid
        ));
        assert!(matches!(
            ConnectorError::from_status(503),
            ConnectorError::UpstreamUnavailable(_)
        ));
    }

    #[test]
    fn test_transience() {
        assert!(ConnectorError::Timeout { elapsed_ms: 100 }.is_transient());
        assert!(ConnectorError::UpstreamUnavailable("x".into()).is_transient());
        assert!(!ConnectorError::CredentialsInvalid.is_transient());
        assert!(!ConnectorError::MalformedResponse("x".into()).is_transient());
        assert!(!ConnectorError::RateLimited { retry_after_sec: None }.is_transient());
    }

    #[test]
    fn test_conversion_to_core_error() {
        let err: Error = ConnectorError::RateLimited {
            retry_after_sec: Some(30),
        }
        .into();
        assert_eq!(err.code, ErrorCode::RateLimited);
    }
}
