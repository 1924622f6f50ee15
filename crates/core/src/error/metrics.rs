use super::{Error, ErrorCategory, ErrorSeverity};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const RATE_WINDOW: Duration = Duration::from_secs(300);

/// Error accounting for monitoring and alerting.
///
/// Counts by category, severity, and source connector, plus a sliding
/// five-minute rate. Recording also drives the severity-appropriate log
/// line so call sites never hand-pick levels.
#[derive(Debug, Default)]
pub struct ErrorMetrics {
    by_category: DashMap<ErrorCategory, AtomicU64>,
    by_severity: DashMap<ErrorSeverity, AtomicU64>,
    by_source: DashMap<String, AtomicU64>,
    window: Mutex<VecDeque<Instant>>,
}

impl ErrorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error occurrence.
    pub fn record_error(&self, error: &Error) {
        self.by_category
            .entry(error.category())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
        self.by_severity
            .entry(error.severity)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
        if let Some(source) = &error.context.source {
            self.by_source
                .entry(source.clone())
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(1, Ordering::Relaxed);
        }

        {
            let mut window = self.window.lock().expect("window lock poisoned");
            let now = Instant::now();
            window.push_back(now);
            while let Some(front) = window.front() {
                if now.duration_since(*front) > RATE_WINDOW {
                    window.pop_front();
                } else {
                    break;
                }
            }
        }

        match error.severity {
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_id = %error.context.error_id,
                    error_code = ?error.code,
                    "Low severity error occurred"
                );
            }
            ErrorSeverity::Medium => {
                tracing::info!(
                    error_id = %error.context.error_id,
                    error_code = ?error.code,
                    message = %error.message,
                    "Medium severity error occurred"
                );
            }
            ErrorSeverity::High => {
                tracing::warn!(
                    error_id = %error.context.error_id,
                    error_code = ?error.code,
                    message = %error.message,
                    details = ?error.details,
                    "High severity error occurred"
                );
            }
            ErrorSeverity::Critical => {
                tracing::error!(
                    error_id = %error.context.error_id,
                    error_code = ?error.code,
                    message = %error.message,
                    details = ?error.details,
                    context = ?error.context,
                    "Critical error occurred"
                );
            }
        }
    }

    pub fn category_count(&self, category: ErrorCategory) -> u64 {
        self.by_category
            .get(&category)
            .map(|counter| counter.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn severity_count(&self, severity: ErrorSeverity) -> u64 {
        self.by_severity
            .get(&severity)
            .map(|counter| counter.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn source_count(&self, source: &str) -> u64 {
        self.by_source
            .get(source)
            .map(|counter| counter.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Errors per minute over the sliding window.
    pub fn error_rate(&self) -> f64 {
        let window = self.window.lock().expect("window lock poisoned");
        window.len() as f64 / (RATE_WINDOW.as_secs_f64() / 60.0)
    }

    pub fn is_high_error_rate(&self) -> bool {
        self.error_rate() > 10.0
    }

    /// Reset all counters; test hook.
    pub fn reset(&self) {
        self.by_category.clear();
        self.by_severity.clear();
        self.by_source.clear();
        self.window.lock().expect("window lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_counts_by_category_severity_and_source() {
        let metrics = ErrorMetrics::new();

        let error = Error::new(ErrorCode::QueryTimeout, "slow upstream")
            .with_source_name("web_archive");
        metrics.record_error(&error);
        metrics.record_error(&error);

        assert_eq!(metrics.category_count(ErrorCategory::Source), 2);
        assert_eq!(metrics.severity_count(ErrorSeverity::Medium), 2);
        assert_eq!(metrics.source_count("web_archive"), 2);
        assert_eq!(metrics.source_count("whois_lookup"), 0);
    }

    #[test]
    fn test_error_rate_reflects_window() {
        let metrics = ErrorMetrics::new();
        for _ in 0..5 {
            metrics.record_error(&Error::upstream_unavailable("down"));
        }
        assert!(metrics.error_rate() > 0.0);
        assert!(!metrics.is_high_error_rate());

        metrics.reset();
        assert_eq!(metrics.error_rate(), 0.0);
    }
}
