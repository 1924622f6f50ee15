use super::MetricsRegistry;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
};
use tracing::warn;

/// Pipeline-wide Prometheus instruments.
///
/// Constructed once at startup and registered into the shared registry;
/// clones are cheap and handed to the coordinator, scheduler, and cache.
#[derive(Clone)]
pub struct PipelineMetrics {
    pub queries_total: IntCounterVec,
    pub query_duration_seconds: HistogramVec,
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub cache_coalesced: IntCounter,
    pub cache_evictions: IntCounter,
    pub rate_limit_throttles: IntCounterVec,
    pub investigations_total: IntCounterVec,
    pub investigation_duration_seconds: Histogram,
    pub inflight_queries: IntGauge,
    pub active_investigations: IntGauge,
    pub progress_events_dropped: IntCounter,
}

impl PipelineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            queries_total: IntCounterVec::new(
                Opts::new("queries_total", "Queries executed by source and outcome"),
                &["source", "outcome"],
            )?,
            query_duration_seconds: HistogramVec::new(
                HistogramOpts::new("query_duration_seconds", "Query latency by source")
                    .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
                &["source"],
            )?,
            cache_hits: IntCounter::new("cache_hits_total", "Result cache hits")?,
            cache_misses: IntCounter::new("cache_misses_total", "Result cache misses")?,
            cache_coalesced: IntCounter::new(
                "cache_coalesced_total",
                "Lookups satisfied by an in-flight fetch",
            )?,
            cache_evictions: IntCounter::new("cache_evictions_total", "LRU evictions")?,
            rate_limit_throttles: IntCounterVec::new(
                Opts::new("rate_limit_throttles_total", "Throttled acquisitions by source"),
                &["source"],
            )?,
            investigations_total: IntCounterVec::new(
                Opts::new("investigations_total", "Investigations by terminal state"),
                &["state"],
            )?,
            investigation_duration_seconds: Histogram::with_opts(
                HistogramOpts::new(
                    "investigation_duration_seconds",
                    "Wall time per investigation",
                )
                .buckets(vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0, 7200.0]),
            )?,
            inflight_queries: IntGauge::new("inflight_queries", "Queries currently executing")?,
            active_investigations: IntGauge::new(
                "active_investigations",
                "Investigations not yet terminal",
            )?,
            progress_events_dropped: IntCounter::new(
                "progress_events_dropped_total",
                "Non-critical progress events dropped on full channels",
            )?,
        })
    }

    /// Register every instrument; duplicate registration is logged and
    /// ignored so tests can build multiple instances.
    pub fn register(&self, registry: &MetricsRegistry) {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(self.queries_total.clone()),
            Box::new(self.query_duration_seconds.clone()),
            Box::new(self.cache_hits.clone()),
            Box::new(self.cache_misses.clone()),
            Box::new(self.cache_coalesced.clone()),
            Box::new(self.cache_evictions.clone()),
            Box::new(self.rate_limit_throttles.clone()),
            Box::new(self.investigations_total.clone()),
            Box::new(self.investigation_duration_seconds.clone()),
            Box::new(self.inflight_queries.clone()),
            Box::new(self.active_investigations.clone()),
            Box::new(self.progress_events_dropped.clone()),
        ];

        for collector in collectors {
            if let Err(e) = registry.register_boxed(collector) {
                warn!("Metric registration failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;

    #[test]
    fn test_metrics_construct_and_register() {
        let registry = MetricsRegistry::new(MetricsConfig {
            enabled: true,
            namespace: "osint_test".to_string(),
            path: "/metrics".to_string(),
        });
        let metrics = PipelineMetrics::new().unwrap();
        metrics.register(&registry);

        metrics
            .queries_total
            .with_label_values(&["whois", "success"])
            .inc();
        metrics.cache_hits.inc();

        let text = registry.metrics_text();
        assert!(text.contains("queries_total"));
    }
}
