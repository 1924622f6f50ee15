use thiserror::Error;

/// Pipeline-stage errors.
///
/// Per-query failures are recorded on the investigation and never abort it;
/// a stage failure on the coordinator's own logic fails that investigation
/// only.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Investigation not found: {id}")]
    InvestigationNotFound { id: String },

    #[error("Report not ready for investigation {id} (status: {status})")]
    ReportNotReady { id: String, status: String },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Validation error: {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Query rejected: {reason}")]
    SecurityRejected { reason: String },

    #[error("Plan exceeds configured cap: {planned} > {cap}")]
    PlanTooLarge { planned: usize, cap: usize },

    #[error("Investigation cancelled")]
    Cancelled,

    #[error("Investigation deadline exceeded")]
    DeadlineExceeded,

    #[error("Resolver error: {0}")]
    Resolution(String),

    #[error("Report assembly error: {0}")]
    Report(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Progress channel closed")]
    ChannelClosed,

    #[error("Core system error: {0}")]
    Core(#[from] osint_core::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Map into the shared error-code taxonomy for API payloads and the
    /// investigation error log.
    pub fn code(&self) -> osint_core::ErrorCode {
        use osint_core::ErrorCode;
        match self {
            PipelineError::InvestigationNotFound { .. } => ErrorCode::NotFound,
            PipelineError::ReportNotReady { .. } => ErrorCode::NotReady,
            PipelineError::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            PipelineError::ValidationError { .. } => ErrorCode::ValidationFailed,
            PipelineError::SecurityRejected { .. } => ErrorCode::SecurityRejected,
            PipelineError::PlanTooLarge { .. } => ErrorCode::PlanningFailed,
            PipelineError::Cancelled => ErrorCode::Cancelled,
            PipelineError::DeadlineExceeded => ErrorCode::DeadlineExceeded,
            PipelineError::Resolution(_) => ErrorCode::ResolutionFailed,
            PipelineError::Report(_) => ErrorCode::ReportFailed,
            PipelineError::Store(_) => ErrorCode::StoreError,
            PipelineError::ChannelClosed => ErrorCode::ChannelClosed,
            PipelineError::Core(err) => err.code,
            PipelineError::Serialization(_) => ErrorCode::SerializationError,
            PipelineError::Internal { .. } => ErrorCode::InternalError,
        }
    }
}

impl From<PipelineError> for osint_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Core(core) => core,
            other => osint_core::Error::new(other.code(), other.to_string()),
        }
    }
}
