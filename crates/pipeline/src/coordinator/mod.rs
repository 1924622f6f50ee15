//! Investigation coordination.
//!
//! One coordinator owns every investigation's state machine, drives the
//! pipeline stages, and fans progress out to subscribers. Per-investigation
//! state is exclusive to its run task; the shared cache, rate limiter, and
//! registry are process-wide singletons injected at startup.

mod events;

pub use events::{EventBus, EventStream};

use crate::entity::{EntityId, NormalizedEntity};
use crate::error::{PipelineError, Result};
use crate::graph::EntityGraph;
use crate::matcher::FuzzyMatcher;
use crate::normalize::Normalizer;
use crate::parser::Parser;
use crate::planner::{DiscoveryPlanner, PlanOutcome, PlannerConfig};
use crate::report::{Report, Reporter};
use crate::resolver::{enrich_graph_and_timeline, EntityResolver, ResolverConfig};
use crate::scheduler::{FetchScheduler, QueryOutcome, ScheduleScope, SchedulerConfig};
use crate::store::InvestigationStore;
use crate::timeline::TimelineBuilder;
use crate::types::{
    InvestigationRecord, InvestigationRequest, InvestigationStatus, ProgressEvent,
    ProgressEventType,
};
use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use osint_connectors::{ConnectorRegistry, QueryScreen};
use osint_core::metrics::PipelineMetrics;
use osint_core::types::{Query, QueryKind, RawResult};
use osint_core::{Error, ErrorMetrics, InvestigationId, RateLimitController, ResultCache};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use validator::Validate;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Wall-clock cap when the request does not set one
    pub default_deadline: Duration,
    /// Progress ring capacity per investigation
    pub progress_capacity: usize,
    pub planner: PlannerConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_deadline: Duration::from_secs(120 * 60),
            progress_capacity: 64,
            planner: PlannerConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_config(config: &osint_core::Config) -> Self {
        Self {
            default_deadline: Duration::from_secs(
                config.pipeline.max_investigation_duration_min * 60,
            ),
            progress_capacity: config.pipeline.progress_channel_capacity,
            planner: PlannerConfig {
                max_plan_size: config.pipeline.max_plan_size,
            },
            scheduler: SchedulerConfig {
                max_concurrent: config.pipeline.max_concurrent_queries,
                default_query_timeout: Duration::from_secs(
                    config.pipeline.default_query_timeout_sec,
                ),
                retry: config.retry.clone(),
            },
        }
    }
}

struct ActiveInvestigation {
    cancel: CancellationToken,
    bus: EventBus,
    record: Arc<RwLock<InvestigationRecord>>,
}

pub struct InvestigationCoordinator {
    registry: Arc<ConnectorRegistry>,
    cache: Arc<ResultCache>,
    rate_limiter: Arc<RateLimitController>,
    screen: Arc<QueryScreen>,
    store: Arc<dyn InvestigationStore>,
    metrics: Option<PipelineMetrics>,
    error_metrics: ErrorMetrics,
    config: CoordinatorConfig,
    active: DashMap<String, ActiveInvestigation>,
}

impl InvestigationCoordinator {
    pub fn new(
        registry: Arc<ConnectorRegistry>,
        cache: Arc<ResultCache>,
        rate_limiter: Arc<RateLimitController>,
        screen: Arc<QueryScreen>,
        store: Arc<dyn InvestigationStore>,
        config: CoordinatorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            cache,
            rate_limiter,
            screen,
            store,
            metrics: None,
            error_metrics: ErrorMetrics::new(),
            config,
            active: DashMap::new(),
        })
    }

    pub fn with_metrics(
        registry: Arc<ConnectorRegistry>,
        cache: Arc<ResultCache>,
        rate_limiter: Arc<RateLimitController>,
        screen: Arc<QueryScreen>,
        store: Arc<dyn InvestigationStore>,
        config: CoordinatorConfig,
        metrics: PipelineMetrics,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            cache,
            rate_limiter,
            screen,
            store,
            metrics: Some(metrics),
            error_metrics: ErrorMetrics::new(),
            config,
            active: DashMap::new(),
        })
    }

    /// Aggregate error accounting across investigations.
    pub fn error_metrics(&self) -> &ErrorMetrics {
        &self.error_metrics
    }

    /// Validate and accept an investigation; the pipeline starts
    /// immediately on a background task.
    pub async fn submit(self: &Arc<Self>, request: InvestigationRequest) -> Result<InvestigationRecord> {
        request
            .validate()
            .map_err(|errors| PipelineError::ValidationError {
                field: errors
                    .errors()
                    .keys()
                    .next()
                    .map(|key| key.to_string())
                    .unwrap_or_else(|| "request".to_string()),
                message: errors.to_string(),
            })?;

        let mut record = InvestigationRecord::new(request);
        let planned_estimate = 1 + record.subject_identifiers.emails.len()
            + record.subject_identifiers.usernames.len()
            + record.subject_identifiers.known_domains.len();
        record.estimated_completion = Some(
            record.started_at
                + chrono::Duration::seconds((planned_estimate as i64 * 10).clamp(30, 600)),
        );
        self.store.save_investigation(&record).await?;

        let handle = ActiveInvestigation {
            cancel: CancellationToken::new(),
            bus: EventBus::new(self.config.progress_capacity),
            record: Arc::new(RwLock::new(record.clone())),
        };
        let cancel = handle.cancel.clone();
        let bus = handle.bus.clone();
        let shared = Arc::clone(&handle.record);
        self.active
            .insert(record.investigation_id.as_str().to_string(), handle);

        if let Some(metrics) = &self.metrics {
            metrics.active_investigations.inc();
        }

        let coordinator = Arc::clone(self);
        let id = record.investigation_id.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let pipeline = Arc::clone(&coordinator).run_pipeline(
                id.clone(),
                Arc::clone(&shared),
                bus.clone(),
                cancel,
            );
            let run = std::panic::AssertUnwindSafe(pipeline).catch_unwind().await;

            let terminal = match run {
                Ok(Ok(status)) => status,
                Ok(Err(error)) => {
                    error!(investigation_id = %id, error = %error, "investigation failed");
                    coordinator
                        .mark_failed(&id, &shared, &bus, Error::from(error))
                        .await;
                    InvestigationStatus::Failed
                }
                Err(_panic) => {
                    error!(investigation_id = %id, "investigation task panicked");
                    coordinator
                        .mark_failed(
                            &id,
                            &shared,
                            &bus,
                            Error::internal("pipeline stage panicked"),
                        )
                        .await;
                    InvestigationStatus::Failed
                }
            };

            if let Some(metrics) = &coordinator.metrics {
                metrics.active_investigations.dec();
                metrics
                    .investigations_total
                    .with_label_values(&[terminal.as_str()])
                    .inc();
                metrics
                    .investigation_duration_seconds
                    .observe(started.elapsed().as_secs_f64());
            }
            coordinator.active.remove(id.as_str());
        });

        Ok(record)
    }

    /// Current record; the store is authoritative once terminal.
    pub async fn status(&self, id: &InvestigationId) -> Result<InvestigationRecord> {
        // Clone the handle out before awaiting so no map shard stays held.
        let live = self
            .active
            .get(id.as_str())
            .map(|active| Arc::clone(&active.record));
        if let Some(record) = live {
            return Ok(record.read().await.clone());
        }
        self.store
            .get_investigation(id)
            .await?
            .ok_or_else(|| PipelineError::InvestigationNotFound {
                id: id.as_str().to_string(),
            })
    }

    pub async fn report(&self, id: &InvestigationId) -> Result<Report> {
        let record = self.status(id).await?;
        match record.status {
            InvestigationStatus::Completed | InvestigationStatus::Cancelled => self
                .store
                .get_report(id)
                .await?
                .ok_or_else(|| PipelineError::ReportNotReady {
                    id: id.as_str().to_string(),
                    status: record.status.as_str().to_string(),
                }),
            status => Err(PipelineError::ReportNotReady {
                id: id.as_str().to_string(),
                status: status.as_str().to_string(),
            }),
        }
    }

    /// Cancel an in-flight investigation; terminal ones are untouched.
    pub async fn cancel(&self, id: &InvestigationId) -> Result<()> {
        if let Some(active) = self.active.get(id.as_str()) {
            info!(investigation_id = %id, "cancellation requested");
            active.cancel.cancel();
            return Ok(());
        }
        // Known but finished: cancel is a no-op, unknown is an error.
        self.status(id).await.map(|_| ())
    }

    /// Subscribe to progress. Late subscribers get the current status as
    /// their first event.
    pub async fn subscribe(
        &self,
        id: &InvestigationId,
    ) -> Result<(ProgressEvent, Option<EventStream>)> {
        let record = self.status(id).await?;
        let current = ProgressEvent::new(
            ProgressEventType::StatusUpdate,
            id.clone(),
            serde_json::json!({
                "status": record.status.as_str(),
                "progress_percentage": record.progress_percentage,
                "entities_found": record.entities_found,
                "queries_executed": record.queries_executed,
            }),
        );
        let stream = self
            .active
            .get(id.as_str())
            .map(|active| active.bus.subscribe());
        Ok((current, stream))
    }

    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<InvestigationRecord>> {
        self.store.list_investigations(limit, offset).await
    }

    pub async fn delete(&self, id: &InvestigationId) -> Result<bool> {
        if let Some(active) = self.active.get(id.as_str()) {
            active.cancel.cancel();
        }
        self.store.delete_investigation(id).await
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    async fn run_pipeline(
        self: Arc<Self>,
        id: InvestigationId,
        shared: Arc<RwLock<InvestigationRecord>>,
        bus: EventBus,
        cancel: CancellationToken,
    ) -> Result<InvestigationStatus> {
        let (seed, constraints, thresholds, started_at) = {
            let record = shared.read().await;
            (
                record.subject_identifiers.clone(),
                record.constraints.clone(),
                record.thresholds,
                record.started_at,
            )
        };

        let deadline_duration = constraints
            .max_duration_min
            .map(|minutes| Duration::from_secs(minutes * 60))
            .unwrap_or(self.config.default_deadline);
        let deadline = Instant::now() + deadline_duration;

        // Planning.
        self.transition(&shared, &bus, InvestigationStatus::Planning, 5.0)
            .await?;
        let planner = DiscoveryPlanner::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.screen),
            self.config.planner.clone(),
        );
        let PlanOutcome {
            queries: mut pending,
            rejected,
        } = planner.plan(&seed)?;
        {
            let mut record = shared.write().await;
            record.queries_planned = pending.len();
            for error in &rejected {
                record.record_error(error);
                bus.publish(ProgressEvent::new(
                    ProgressEventType::Error,
                    id.clone(),
                    serde_json::json!({
                        "kind": error.code.kind(),
                        "message": error.message,
                    }),
                ));
            }
            self.store.save_investigation(&record).await?;
        }

        let normalizer = Normalizer::new(
            seed.geographic_hints
                .as_ref()
                .and_then(|hints| hints.country.clone()),
        );
        let parser = Parser::new();
        let resolver = EntityResolver::new(
            FuzzyMatcher::default(),
            ResolverConfig {
                merge_threshold: thresholds.minimum_entity_confidence,
            },
        );
        let min_source_confidence = thresholds.minimum_source_confidence as f64 / 100.0;

        let mut scheduler =
            FetchScheduler::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.cache),
                Arc::clone(&self.rate_limiter),
                self.config.scheduler.clone(),
            );
        if let Some(metrics) = &self.metrics {
            scheduler = scheduler.with_metrics(metrics.clone());
        }
        let scheduler = Arc::new(scheduler);

        let mut all_candidates: Vec<NormalizedEntity> = Vec::new();
        let mut all_raw: Vec<RawResult> = Vec::new();
        let mut executed: BTreeSet<(QueryKind, String)> = pending
            .iter()
            .map(|query| (query.kind, query.query_string.clone()))
            .collect();
        let mut entities = Vec::new();
        let mut known_entities: BTreeSet<EntityId> = BTreeSet::new();
        let mut graph = EntityGraph::new();
        let mut timeline = TimelineBuilder::new();
        let mut deadline_hit = false;
        let mut round: u8 = 0;

        while !pending.is_empty() && round < constraints.max_search_depth && !deadline_hit {
            if cancel.is_cancelled() {
                break;
            }
            self.transition(&shared, &bus, InvestigationStatus::Fetching, 10.0)
                .await?;

            let scope_cancel = cancel.child_token();
            let scope = ScheduleScope::new(scope_cancel.clone(), deadline);
            let queries: Vec<Query> = std::mem::take(&mut pending);
            let mut rx = Arc::clone(&scheduler).run(queries, scope);

            loop {
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => {
                        scope_cancel.cancel();
                        break;
                    }
                    _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                        warn!(investigation_id = %id, "deadline reached, stopping fetches");
                        deadline_hit = true;
                        scope_cancel.cancel();
                        break;
                    }
                    outcome = rx.recv() => match outcome {
                        Some(outcome) => outcome,
                        None => break,
                    },
                };

                self.absorb_outcome(
                    &id,
                    &shared,
                    &bus,
                    outcome,
                    &parser,
                    &normalizer,
                    min_source_confidence,
                    &mut all_candidates,
                    &mut all_raw,
                )
                .await?;
            }

            // Resolution over the cumulative candidate set; the graph and
            // timeline are rebuilt from the full outcome.
            self.transition(&shared, &bus, InvestigationStatus::Resolving, 80.0)
                .await?;
            let outcome = resolver.resolve(all_candidates.clone());
            graph = EntityGraph::new();
            timeline = TimelineBuilder::new();
            enrich_graph_and_timeline(&outcome, &mut graph, &mut timeline);

            for entity in &outcome.entities {
                if known_entities.insert(entity.entity_id.clone()) {
                    bus.publish(ProgressEvent::new(
                        ProgressEventType::NewEntity,
                        id.clone(),
                        serde_json::json!({
                            "entity_id": entity.entity_id.as_str(),
                            "entity_type": entity.entity_type.as_str(),
                            "confidence": entity.confidence,
                            "verification_status": entity.verification_status.as_str(),
                        }),
                    ));
                }
            }
            entities = outcome.entities;
            {
                let mut record = shared.write().await;
                record.entities_found = entities.len();
                self.store.save_investigation(&record).await?;
            }

            round += 1;
            if round < constraints.max_search_depth && !cancel.is_cancelled() && !deadline_hit {
                let follow_up = planner.follow_up(&seed, &entities, round)?;
                for error in &follow_up.rejected {
                    let mut record = shared.write().await;
                    record.record_error(error);
                }
                pending = follow_up
                    .queries
                    .into_iter()
                    .filter(|query| {
                        executed.insert((query.kind, query.query_string.clone()))
                    })
                    .collect();
                if !pending.is_empty() {
                    let mut record = shared.write().await;
                    record.queries_planned += pending.len();
                    self.store.save_investigation(&record).await?;
                }
            }
        }

        let cancelled = cancel.is_cancelled();
        if deadline_hit {
            let mut record = shared.write().await;
            let timeout_error = Error::new(
                osint_core::ErrorCode::DeadlineExceeded,
                format!(
                    "investigation exceeded its {}min deadline",
                    deadline_duration.as_secs() / 60
                ),
            );
            record.record_error(&timeout_error);
        }

        // Reporting runs on whatever was collected, even after deadline or
        // cancellation.
        self.transition(&shared, &bus, InvestigationStatus::Reporting, 90.0)
            .await?;
        let partial = deadline_hit || cancelled;
        let report = {
            let record = shared.read().await;
            Reporter::build(&record, &entities, &graph, &timeline, &all_raw, partial)
        };
        if !crate::report::verify_traceability(&report, &all_raw) {
            warn!(
                investigation_id = %id,
                "report contains findings without retained source results"
            );
        }
        self.store.save_report(&id, &report).await?;

        let terminal = if cancelled {
            InvestigationStatus::Cancelled
        } else {
            InvestigationStatus::Completed
        };
        {
            let mut record = shared.write().await;
            record.status = terminal;
            record.current_stage = terminal.as_str().to_string();
            record.progress_percentage = 100.0;
            record.completed_at = Some(Utc::now());
            self.store.save_investigation(&record).await?;
        }
        bus.publish(ProgressEvent::new(
            ProgressEventType::Completion,
            id.clone(),
            serde_json::json!({
                "status": terminal.as_str(),
                "partial": partial,
                "entities_found": entities.len(),
                "overall_risk": report.executive_summary.overall_score,
            }),
        ));
        info!(
            investigation_id = %id,
            status = terminal.as_str(),
            partial = partial,
            entities = entities.len(),
            elapsed_ms = (Utc::now() - started_at).num_milliseconds(),
            "investigation finished"
        );

        Ok(terminal)
    }

    #[allow(clippy::too_many_arguments)]
    async fn absorb_outcome(
        &self,
        id: &InvestigationId,
        shared: &Arc<RwLock<InvestigationRecord>>,
        bus: &EventBus,
        outcome: QueryOutcome,
        parser: &Parser,
        normalizer: &Normalizer,
        min_source_confidence: f64,
        all_candidates: &mut Vec<NormalizedEntity>,
        all_raw: &mut Vec<RawResult>,
    ) -> Result<()> {
        let mut record = shared.write().await;
        record.queries_executed += 1;

        match outcome.result {
            Ok((results, _cache_status)) => {
                let source_confidence = self
                    .registry
                    .get(&outcome.connector)
                    .map(|connector| connector.base_confidence())
                    .unwrap_or(0.0);
                // Sources below the investigation's confidence floor are
                // fetched (the plan routed them) but never parsed.
                if source_confidence >= min_source_confidence {
                    record.status = InvestigationStatus::Parsing;
                    record.current_stage = InvestigationStatus::Parsing.as_str().to_string();
                    for raw in results.iter() {
                        all_raw.push(raw.clone());
                        for candidate in parser.parse(raw, source_confidence) {
                            all_candidates.push(normalizer.normalize(candidate));
                        }
                    }
                }
            }
            Err(error) => {
                self.error_metrics.record_error(&error);
                record.record_error(&error);
                bus.publish(ProgressEvent::new(
                    ProgressEventType::Error,
                    id.clone(),
                    serde_json::json!({
                        "kind": error.code.kind(),
                        "source": error.context.source,
                        "query_id": error.context.query_id,
                        "message": error.message,
                    }),
                ));
            }
        }

        // Weighted progress: executed queries dominate, resolution volume
        // tops it up. Fetch/parse occupies the 10-80 band.
        let query_fraction = if record.queries_planned > 0 {
            record.queries_executed as f64 / record.queries_planned as f64
        } else {
            1.0
        };
        let entity_fraction =
            (record.entities_found as f64 / record.queries_planned.max(1) as f64).min(1.0);
        let combined = 0.7 * query_fraction + 0.3 * entity_fraction;
        record.progress_percentage = (10.0 + combined * 70.0).min(80.0) as f32;

        bus.publish(ProgressEvent::new(
            ProgressEventType::StatusUpdate,
            id.clone(),
            serde_json::json!({
                "status": record.status.as_str(),
                "progress_percentage": record.progress_percentage,
                "queries_executed": record.queries_executed,
                "queries_planned": record.queries_planned,
            }),
        ));
        self.store.save_investigation(&record).await?;
        Ok(())
    }

    async fn transition(
        &self,
        shared: &Arc<RwLock<InvestigationRecord>>,
        bus: &EventBus,
        next: InvestigationStatus,
        progress_floor: f32,
    ) -> Result<()> {
        let mut record = shared.write().await;
        if record.status == next {
            return Ok(());
        }
        if !record.status.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: record.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        record.status = next;
        record.current_stage = next.as_str().to_string();
        record.progress_percentage = record.progress_percentage.max(progress_floor);
        bus.publish(ProgressEvent::new(
            ProgressEventType::StageTransition,
            record.investigation_id.clone(),
            serde_json::json!({
                "stage": next.as_str(),
                "progress_percentage": record.progress_percentage,
            }),
        ));
        self.store.save_investigation(&record).await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: &InvestigationId,
        shared: &Arc<RwLock<InvestigationRecord>>,
        bus: &EventBus,
        error: Error,
    ) {
        let mut record = shared.write().await;
        record.status = InvestigationStatus::Failed;
        record.current_stage = InvestigationStatus::Failed.as_str().to_string();
        record.completed_at = Some(Utc::now());
        self.error_metrics.record_error(&error);
        record.record_error(&error);
        if let Err(store_error) = self.store.save_investigation(&record).await {
            error!(
                investigation_id = %id,
                error = %store_error,
                "failed to persist failed investigation"
            );
        }
        bus.publish(ProgressEvent::new(
            ProgressEventType::Error,
            id.clone(),
            serde_json::json!({
                "kind": error.code.kind(),
                "message": error.message,
                "terminal": true,
            }),
        ));
    }
}
