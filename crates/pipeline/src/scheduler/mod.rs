//! Fetch scheduling: fan a query plan out to connectors with bounded
//! concurrency, retries, and per-completion progress.
//!
//! Every fetch goes cache -> rate limiter -> connector. Unsafe content is
//! screened and redacted before anything enters the cache. Outcomes stream
//! back over a channel so parsing and resolution can run while fetching
//! continues.

use osint_connectors::{ConnectorError, ConnectorRegistry, SearchContext, SourceConnector};
use osint_core::config::RetrySettings;
use osint_core::metrics::PipelineMetrics;
use osint_core::types::{Query, RawResult};
use osint_core::{AcquireMode, CacheStatus, Error, ErrorCode, Fingerprint, RateLimitController, ResultCache};
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Per-investigation concurrency cap
    pub max_concurrent: usize,
    /// Per-query timeout (connector calls may not exceed it)
    pub default_query_timeout: Duration,
    pub retry: RetrySettings,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 16,
            default_query_timeout: Duration::from_secs(30),
            retry: RetrySettings {
                max_attempts: 3,
                backoff_base_ms: 500,
                backoff_factor: 2.0,
                backoff_cap_ms: 30_000,
            },
        }
    }
}

/// Scope shared by every task of one scheduling run
#[derive(Clone)]
pub struct ScheduleScope {
    pub cancel: CancellationToken,
    /// Investigation deadline; queries never start an attempt past it
    pub deadline: Instant,
}

impl ScheduleScope {
    pub fn new(cancel: CancellationToken, deadline: Instant) -> Self {
        Self { cancel, deadline }
    }
}

/// Per-query record of what happened
#[derive(Debug)]
pub struct QueryOutcome {
    pub query: Query,
    pub connector: String,
    pub attempts: u32,
    pub duration: Duration,
    pub result: Result<(Arc<Vec<RawResult>>, CacheStatus), Error>,
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct FetchScheduler {
    registry: Arc<ConnectorRegistry>,
    cache: Arc<ResultCache>,
    rate_limiter: Arc<RateLimitController>,
    config: SchedulerConfig,
    metrics: Option<PipelineMetrics>,
}

impl FetchScheduler {
    pub fn new(
        registry: Arc<ConnectorRegistry>,
        cache: Arc<ResultCache>,
        rate_limiter: Arc<RateLimitController>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            rate_limiter,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run the plan. Outcomes stream over the returned receiver as each
    /// `(query, connector)` task finishes; the channel closes when the run
    /// drains or is cancelled (queued tasks are dropped on cancel).
    pub fn run(self: Arc<Self>, queries: Vec<Query>, scope: ScheduleScope) -> mpsc::Receiver<QueryOutcome> {
        let (tx, rx) = mpsc::channel(64);
        let tasks = order_tasks(queries);
        info!(tasks = tasks.len(), "fetch run starting");

        tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
            let mut handles = Vec::new();

            for (query, connector_name) in tasks {
                if scope.cancel.is_cancelled() {
                    debug!("cancelled, dropping queued queries");
                    break;
                }
                let permit = tokio::select! {
                    _ = scope.cancel.cancelled() => break,
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let scheduler = Arc::clone(&self);
                let scope = scope.clone();
                let tx = tx.clone();
                handles.push(tokio::spawn(async move {
                    let outcome = scheduler.execute(query, connector_name, &scope).await;
                    drop(permit);
                    let _ = tx.send(outcome).await;
                }));
            }

            for handle in handles {
                let _ = handle.await;
            }
            info!("fetch run drained");
        });

        rx
    }

    async fn execute(
        &self,
        query: Query,
        connector_name: String,
        scope: &ScheduleScope,
    ) -> QueryOutcome {
        let started = Instant::now();
        let mut attempts = 0;

        let connector = match self.registry.get(&connector_name) {
            Some(connector) => connector,
            None => {
                return QueryOutcome {
                    query,
                    connector: connector_name.clone(),
                    attempts: 0,
                    duration: started.elapsed(),
                    result: Err(Error::new(
                        ErrorCode::ConnectorNotFound,
                        format!("connector '{}' is not registered", connector_name),
                    )
                    .with_source_name(connector_name)),
                };
            }
        };

        let result = loop {
            attempts += 1;
            match self.attempt(&query, &connector, scope).await {
                Ok(success) => {
                    self.rate_limiter.record_success(connector.source_name());
                    break Ok(success);
                }
                Err(error) => {
                    let classified = self.classify(&error, attempts, scope);
                    match classified {
                        Disposition::Retry { delay } => {
                            warn!(
                                query_id = %query.query_id,
                                source = %connector_name,
                                attempt = attempts,
                                error = %error,
                                "transient failure, retrying"
                            );
                            tokio::select! {
                                _ = scope.cancel.cancelled() => {
                                    break Err(Error::cancelled("investigation cancelled")
                                        .with_query_id(query.query_id.as_str()));
                                }
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                        Disposition::Terminal => {
                            break Err(error
                                .with_source_name(connector_name.clone())
                                .with_query_id(query.query_id.as_str()));
                        }
                    }
                }
            }
        };

        let duration = started.elapsed();
        if let Some(metrics) = &self.metrics {
            let outcome_label = match &result {
                Ok(_) if attempts > 1 => "retried_success",
                Ok(_) => "success",
                Err(error) => error.code.kind(),
            };
            metrics
                .queries_total
                .with_label_values(&[connector.source_name(), outcome_label])
                .inc();
            metrics
                .query_duration_seconds
                .with_label_values(&[connector.source_name()])
                .observe(duration.as_secs_f64());
        }

        QueryOutcome {
            query,
            connector: connector_name,
            attempts,
            duration,
            result,
        }
    }

    async fn attempt(
        &self,
        query: &Query,
        connector: &Arc<dyn SourceConnector>,
        scope: &ScheduleScope,
    ) -> Result<(Arc<Vec<RawResult>>, CacheStatus), Error> {
        if scope.cancel.is_cancelled() {
            return Err(Error::cancelled("investigation cancelled"));
        }
        let now = Instant::now();
        if now >= scope.deadline {
            return Err(Error::new(
                ErrorCode::DeadlineExceeded,
                "investigation deadline reached before query start",
            ));
        }

        let source = connector.source_name().to_string();
        let query_deadline = (now + self.config.default_query_timeout).min(scope.deadline);

        // Serialized FIFO through the source's bucket; blocks through any
        // active backoff window, bounded by the deadline. Cancellation
        // releases the bucket queue position immediately.
        tokio::select! {
            _ = scope.cancel.cancelled() => {
                return Err(Error::cancelled("investigation cancelled"));
            }
            acquired = self.rate_limiter.acquire(&source, AcquireMode::Block, Some(query_deadline)) => {
                acquired?;
            }
        }

        let fingerprint = Fingerprint::compute(&source, &query.query_string, &query.parameters);
        let timeout = query_deadline.saturating_duration_since(Instant::now());
        let ctx = SearchContext::with_cancel(timeout, scope.cancel.child_token());
        let query_clone = query.clone();
        let connector = Arc::clone(connector);
        let rate_limiter = Arc::clone(&self.rate_limiter);

        let (results, status) = self
            .cache
            .get_or_fetch(&source, &fingerprint, || async move {
                let search_result = connector.search(&query_clone, &ctx).await;
                match search_result {
                    Ok(mut results) => {
                        // Redact unsafe content before it can be cached.
                        for result in &mut results {
                            crate::parser::sanitize::screen(
                                result,
                                crate::parser::sanitize::DEFAULT_SIZE_CAP,
                            );
                        }
                        Ok(results)
                    }
                    Err(error) => {
                        if matches!(error, ConnectorError::RateLimited { .. }) {
                            rate_limiter.record_rate_limited(connector.source_name());
                        }
                        Err(Error::from(error))
                    }
                }
            })
            .await?;

        if let Some(metrics) = &self.metrics {
            match status {
                CacheStatus::Hit => metrics.cache_hits.inc(),
                CacheStatus::MissFetched => metrics.cache_misses.inc(),
                CacheStatus::Coalesced => metrics.cache_coalesced.inc(),
            }
        }

        Ok((results, status))
    }

    fn classify(&self, error: &Error, attempts: u32, scope: &ScheduleScope) -> Disposition {
        if scope.cancel.is_cancelled() || Instant::now() >= scope.deadline {
            return Disposition::Terminal;
        }
        match error.code {
            // The rate limiter's backoff window paces the next attempt.
            ErrorCode::RateLimited if attempts < self.config.retry.max_attempts => {
                Disposition::Retry {
                    delay: Duration::from_millis(50),
                }
            }
            code if code.is_retryable() && attempts < self.config.retry.max_attempts => {
                let base = self.config.retry.backoff_base_ms as f64;
                let factor = self.config.retry.backoff_factor.max(1.0);
                let raw = (base * factor.powi(attempts as i32 - 1))
                    .min(self.config.retry.backoff_cap_ms as f64);
                let jitter = rand::thread_rng().gen_range(-0.2..=0.2);
                Disposition::Retry {
                    delay: Duration::from_millis((raw * (1.0 + jitter)).max(0.0) as u64),
                }
            }
            _ => Disposition::Terminal,
        }
    }
}

enum Disposition {
    Retry { delay: Duration },
    Terminal,
}

/// Expand queries into `(query, connector)` tasks, drained in priority
/// order with round-robin across connectors inside each priority band so
/// no single source is starved.
fn order_tasks(queries: Vec<Query>) -> Vec<(Query, String)> {
    use std::cmp::Reverse;
    use std::collections::VecDeque;

    let mut bands: BTreeMap<Reverse<u8>, BTreeMap<String, VecDeque<Query>>> = BTreeMap::new();
    for query in queries {
        for connector in &query.target_connectors {
            bands
                .entry(Reverse(query.priority))
                .or_default()
                .entry(connector.clone())
                .or_default()
                .push_back(query.clone());
        }
    }

    let mut ordered = Vec::new();
    for (_, mut by_connector) in bands {
        loop {
            let mut emitted = false;
            for (connector, queue) in by_connector.iter_mut() {
                if let Some(query) = queue.pop_front() {
                    ordered.push((query, connector.clone()));
                    emitted = true;
                }
            }
            if !emitted {
                break;
            }
        }
    }
    ordered
}
