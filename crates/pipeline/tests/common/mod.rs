//! Shared fixtures for pipeline integration tests.

use async_trait::async_trait;
use osint_connectors::{
    ConnectorError, ConnectorRegistry, ConnectorResult, QueryScreen, SearchContext,
    SourceConnector,
};
use osint_core::config::{CacheSettings, RateLimitSettings};
use osint_core::types::{EntityType, MediaType, Query, RawResult, SourceType};
use osint_core::{InvestigationId, RateLimitController, ResultCache};
use osint_pipeline::store::MemoryStore;
use osint_pipeline::{
    Constraints, CoordinatorConfig, InvestigationCoordinator, InvestigationRecord,
    InvestigationRequest, InvestigationStatus, SchedulerConfig, SeedInput, Thresholds,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A scriptable connector: canned results per query, optional delay,
/// optional leading failures, call counting.
pub struct ScriptedConnector {
    pub name: &'static str,
    pub entity_types: Vec<EntityType>,
    pub calls: Arc<AtomicU32>,
    pub delay: Duration,
    pub rate_limited_first: u32,
    pub make_results: fn(&Query) -> Vec<(String, String, String)>,
}

impl ScriptedConnector {
    pub fn new(
        name: &'static str,
        entity_types: Vec<EntityType>,
        make_results: fn(&Query) -> Vec<(String, String, String)>,
    ) -> Self {
        Self {
            name,
            entity_types,
            calls: Arc::new(AtomicU32::new(0)),
            delay: Duration::ZERO,
            rate_limited_first: 0,
            make_results,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_rate_limited_first(mut self, n: u32) -> Self {
        self.rate_limited_first = n;
        self
    }
}

#[async_trait]
impl SourceConnector for ScriptedConnector {
    fn source_name(&self) -> &str {
        self.name
    }
    fn source_type(&self) -> SourceType {
        SourceType::SearchEngine
    }
    fn supported_entity_types(&self) -> &[EntityType] {
        &self.entity_types
    }
    fn rate_limit_per_hour(&self) -> u32 {
        1_000_000
    }
    fn base_confidence(&self) -> f64 {
        0.9
    }

    async fn search(&self, query: &Query, ctx: &SearchContext) -> ConnectorResult<Vec<RawResult>> {
        ctx.check()?;
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.rate_limited_first {
            return Err(ConnectorError::RateLimited {
                retry_after_sec: None,
            });
        }
        if !self.delay.is_zero() {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(ConnectorError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
        Ok((self.make_results)(query)
            .into_iter()
            .map(|(url, title, body)| {
                RawResult::new(
                    query.query_id.clone(),
                    self.name,
                    url,
                    title,
                    body.into_bytes(),
                    MediaType::Text,
                )
            })
            .collect())
    }

    async fn validate_credentials(&self) -> ConnectorResult<bool> {
        Ok(true)
    }
}

pub fn build_coordinator(
    registry: ConnectorRegistry,
    config: CoordinatorConfig,
) -> Arc<InvestigationCoordinator> {
    let cache = Arc::new(ResultCache::new(&CacheSettings {
        ttl_sec: 60,
        max_entries: 256,
        redis_url: None,
    }));
    let rate_limiter = Arc::new(RateLimitController::new(RateLimitSettings {
        default_per_hour: 1_000_000,
        backoff_base_ms: 10,
        backoff_factor: 2.0,
        backoff_cap_ms: 100,
        backoff_jitter_frac: 0.0,
    }));
    InvestigationCoordinator::new(
        Arc::new(registry),
        cache,
        rate_limiter,
        Arc::new(QueryScreen::new()),
        Arc::new(MemoryStore::new()),
        config,
    )
}

pub fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        default_deadline: Duration::from_secs(30),
        progress_capacity: 64,
        planner: Default::default(),
        scheduler: SchedulerConfig {
            max_concurrent: 8,
            default_query_timeout: Duration::from_secs(5),
            retry: osint_core::config::RetrySettings {
                max_attempts: 3,
                backoff_base_ms: 5,
                backoff_factor: 2.0,
                backoff_cap_ms: 50,
            },
        },
    }
}

pub fn seed(full_name: &str) -> SeedInput {
    SeedInput {
        full_name: full_name.to_string(),
        usernames: vec![],
        emails: vec![],
        phone_numbers: vec![],
        geographic_hints: None,
        professional_hints: None,
        known_domains: vec![],
    }
}

pub fn request(seed: SeedInput) -> InvestigationRequest {
    InvestigationRequest {
        correlation_id: None,
        subject_identifiers: seed,
        constraints: Constraints::default(),
        thresholds: Thresholds::default(),
    }
}

/// Poll until the investigation reaches a terminal state.
pub async fn wait_terminal(
    coordinator: &Arc<InvestigationCoordinator>,
    id: &InvestigationId,
    timeout: Duration,
) -> InvestigationRecord {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let record = coordinator.status(id).await.expect("status");
        if record.status.is_terminal() {
            return record;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("investigation did not finish: {:?}", record.status);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub fn assert_completed(record: &InvestigationRecord) {
    assert_eq!(record.status, InvestigationStatus::Completed);
    assert!(record.completed_at.is_some());
}
