use crate::error::{ConnectorError, ConnectorResult};
use osint_core::types::{EntityType, Query, QueryKind, RawResult, SourceType};
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation scope for one `search` call.
///
/// Adapters must honor both: abort promptly on cancellation and never run
/// past the deadline. The scheduler derives one context per query attempt.
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

impl SearchContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Fail fast if the scope is already dead.
    pub fn check(&self) -> ConnectorResult<()> {
        if self.cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }
        if self.is_expired() {
            return Err(ConnectorError::Timeout { elapsed_ms: 0 });
        }
        Ok(())
    }
}

/// Capability metadata for registry introspection
#[derive(Debug, Clone, Serialize)]
pub struct ConnectorDescriptor {
    pub source_name: String,
    pub source_type: SourceType,
    pub supported_entity_types: Vec<EntityType>,
    pub rate_limit_per_hour: u32,
    pub base_confidence: f64,
}

/// The capability contract every source adapter satisfies.
///
/// `search` is idempotent for the same `(query, parameters)` within the
/// cache TTL, honors the supplied deadline and cancellation token, and
/// surfaces failures as classified `ConnectorError`s. Adapter failures are
/// per-query errors, never fatal to the pipeline.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Stable identifier, used as rate-limit bucket and cache key component
    fn source_name(&self) -> &str;

    fn source_type(&self) -> SourceType;

    fn supported_entity_types(&self) -> &[EntityType];

    /// Declared hourly request budget enforced by the rate-limit controller
    fn rate_limit_per_hour(&self) -> u32;

    /// Prior confidence in this source's results, in [0, 1]
    fn base_confidence(&self) -> f64;

    /// Per-source cache TTL override; `None` uses the configured default
    fn cache_ttl(&self) -> Option<Duration> {
        None
    }

    /// Whether this connector can serve a query of the given kind. The
    /// default routes on the intersection with `supported_entity_types`.
    fn handles_kind(&self, kind: QueryKind) -> bool {
        let wanted = match kind {
            QueryKind::Name | QueryKind::Composite => EntityType::Person,
            QueryKind::Username => EntityType::Username,
            QueryKind::Email => EntityType::Email,
            QueryKind::Phone => EntityType::Phone,
            QueryKind::Domain => EntityType::Domain,
            QueryKind::Company => EntityType::Organization,
            QueryKind::Location => EntityType::Location,
        };
        self.supported_entity_types().contains(&wanted)
    }

    /// Execute one query against the source, returning raw results.
    async fn search(&self, query: &Query, ctx: &SearchContext) -> ConnectorResult<Vec<RawResult>>;

    /// Probe whether configured credentials are accepted upstream.
    async fn validate_credentials(&self) -> ConnectorResult<bool>;

    fn descriptor(&self) -> ConnectorDescriptor {
        ConnectorDescriptor {
            source_name: self.source_name().to_string(),
            source_type: self.source_type(),
            supported_entity_types: self.supported_entity_types().to_vec(),
            rate_limit_per_hour: self.rate_limit_per_hour(),
            base_confidence: self.base_confidence(),
        }
    }
}
