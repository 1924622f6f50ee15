//! # Configuration Management
//!
//! Hierarchical configuration for the investigation pipeline. Sources are
//! loaded in order of precedence:
//!
//! 1. **Environment variables** with the `OSINT` prefix (highest precedence)
//! 2. **Environment-specific TOML files** (e.g. `config/production.toml`)
//! 3. **Default TOML file** (`config/default.toml`)
//! 4. **Built-in defaults** (lowest precedence)
//!
//! The environment is selected by the `ENVIRONMENT` variable
//! (`development` by default, also `testing` and `production`).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use osint_core::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! let cap = config.pipeline.max_concurrent_queries;
//! ```
//!
//! Environment variables map onto sections via double underscores:
//! `OSINT__CACHE__MAX_ENTRIES=5000` overrides `cache.max_entries`.
//!
//! All tunables recognized at startup are defined here; unknown keys in the
//! TOML files are rejected by deserialization.

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main configuration structure containing all pipeline settings.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Pipeline runtime limits and timeouts
    pub pipeline: PipelineConfig,
    /// Result cache sizing and TTL
    pub cache: CacheSettings,
    /// Per-source rate limiting and backoff
    pub rate_limit: RateLimitSettings,
    /// Transient-failure retry policy
    pub retry: RetrySettings,
    /// Default confidence thresholds
    pub thresholds: ThresholdSettings,
    /// Outbound query screening
    pub security: SecuritySettings,
    /// Cross-Origin Resource Sharing policies
    pub cors: CorsConfig,
    /// Prometheus metrics configuration
    pub metrics: MetricsConfig,
}

/// HTTP server settings
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Pipeline runtime limits.
///
/// These bound what a single investigation may consume. Per-connector
/// overrides (e.g. a slower archive source) layer on top of the defaults.
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Bounded concurrency per investigation (scheduler semaphore size)
    pub max_concurrent_queries: usize,
    /// Default per-query timeout in seconds (connector-overridable)
    pub default_query_timeout_sec: u64,
    /// Default per-investigation wall-clock cap in minutes (1-360)
    pub max_investigation_duration_min: u64,
    /// Hard cap on the number of queries a plan may contain
    pub max_plan_size: usize,
    /// Capacity of the per-investigation progress event channel
    pub progress_channel_capacity: usize,
}

/// Result cache settings.
///
/// `max_entries` is mandatory: the cache refuses to start unbounded.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    /// Default TTL in seconds (per-source overridable by connectors)
    pub ttl_sec: u64,
    /// LRU capacity; eviction starts once this many fingerprints are held
    pub max_entries: usize,
    /// Optional external KV mirror (Redis URL). Unavailability degrades
    /// silently to memory-only operation.
    pub redis_url: Option<String>,
}

/// Per-source rate limiting and backoff settings
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitSettings {
    /// Default hourly budget for connectors that do not declare one
    pub default_per_hour: u32,
    /// Exponential backoff base in milliseconds
    pub backoff_base_ms: u64,
    /// Exponential backoff multiplier
    pub backoff_factor: f64,
    /// Backoff ceiling in milliseconds
    pub backoff_cap_ms: u64,
    /// Jitter applied to each backoff window, as a fraction (0.2 = ±20%)
    pub backoff_jitter_frac: f64,
}

/// Retry policy for transient query failures
#[derive(Debug, Deserialize, Clone)]
pub struct RetrySettings {
    /// Maximum attempts per query including the first
    pub max_attempts: u32,
    /// Retry backoff base in milliseconds
    pub backoff_base_ms: u64,
    /// Retry backoff multiplier
    pub backoff_factor: f64,
    /// Retry backoff ceiling in milliseconds
    pub backoff_cap_ms: u64,
}

/// Default confidence thresholds, overridable per investigation
#[derive(Debug, Deserialize, Clone)]
pub struct ThresholdSettings {
    /// Minimum fuzzy-match score for merging candidates (0-100)
    pub entity_confidence: u8,
    /// Minimum source confidence for counting a source (0-100)
    pub source_confidence: u8,
}

/// Outbound query screening settings.
///
/// Extra patterns extend the built-in blocked set; they can never relax it.
#[derive(Debug, Deserialize, Clone)]
pub struct SecuritySettings {
    pub blocked_patterns: Vec<String>,
}

/// Cross-Origin Resource Sharing (CORS) policies
#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age: Option<u64>,
}

/// Prometheus metrics configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub namespace: String,
    pub path: String,
}

impl Config {
    /// Loads the configuration from files and environment variables.
    ///
    /// Built-in defaults make every key optional, so the pipeline starts
    /// with no configuration files present. Validation rejects values
    /// outside the documented ranges and fails fast at startup.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            // Built-in defaults (lowest precedence)
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000_i64)?
            .set_default("pipeline.max_concurrent_queries", 16_i64)?
            .set_default("pipeline.default_query_timeout_sec", 30_i64)?
            .set_default("pipeline.max_investigation_duration_min", 120_i64)?
            .set_default("pipeline.max_plan_size", 200_i64)?
            .set_default("pipeline.progress_channel_capacity", 64_i64)?
            .set_default("cache.ttl_sec", 3600_i64)?
            .set_default("cache.max_entries", 10000_i64)?
            .set_default("cache.redis_url", None::<String>)?
            .set_default("rate_limit.default_per_hour", 100_i64)?
            .set_default("rate_limit.backoff_base_ms", 1000_i64)?
            .set_default("rate_limit.backoff_factor", 2.0_f64)?
            .set_default("rate_limit.backoff_cap_ms", 300_000_i64)?
            .set_default("rate_limit.backoff_jitter_frac", 0.2_f64)?
            .set_default("retry.max_attempts", 3_i64)?
            .set_default("retry.backoff_base_ms", 500_i64)?
            .set_default("retry.backoff_factor", 2.0_f64)?
            .set_default("retry.backoff_cap_ms", 30_000_i64)?
            .set_default("thresholds.entity_confidence", 70_i64)?
            .set_default("thresholds.source_confidence", 60_i64)?
            .set_default("security.blocked_patterns", Vec::<String>::new())?
            .set_default("cors.allowed_origins", vec!["*".to_string()])?
            .set_default("cors.allowed_methods", vec!["GET".to_string(), "POST".to_string(), "DELETE".to_string()])?
            .set_default("cors.allowed_headers", vec!["content-type".to_string()])?
            .set_default("cors.expose_headers", Vec::<String>::new())?
            .set_default("cors.allow_credentials", false)?
            .set_default("cors.max_age", None::<i64>)?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.namespace", "osint")?
            .set_default("metrics.path", "/metrics")?
            // Configuration files (medium precedence)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Environment variables (highest precedence)
            .add_source(Environment::with_prefix("OSINT").separator("__"));

        let config = builder.build()?;
        let loaded_config: Config = config.try_deserialize()?;

        loaded_config.validate()?;

        Ok(loaded_config)
    }

    /// Validates loaded values against the documented ranges.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_concurrent_queries == 0 {
            return Err(ConfigError::Message(
                "pipeline.max_concurrent_queries must be at least 1".to_string(),
            ));
        }

        if self.pipeline.max_investigation_duration_min < 1
            || self.pipeline.max_investigation_duration_min > 360
        {
            return Err(ConfigError::Message(format!(
                "pipeline.max_investigation_duration_min must be within 1-360 (current: {})",
                self.pipeline.max_investigation_duration_min
            )));
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigError::Message(
                "cache.max_entries is mandatory and must be at least 1".to_string(),
            ));
        }

        if let Some(url) = &self.cache.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ConfigError::Message(
                    "cache.redis_url must be a Redis connection string".to_string(),
                ));
            }
        }

        if self.rate_limit.backoff_factor < 1.0 {
            return Err(ConfigError::Message(
                "rate_limit.backoff_factor must be >= 1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.rate_limit.backoff_jitter_frac) {
            return Err(ConfigError::Message(
                "rate_limit.backoff_jitter_frac must be within 0.0-1.0".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Message(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.thresholds.entity_confidence > 100 || self.thresholds.source_confidence > 100 {
            return Err(ConfigError::Message(
                "threshold values are percentages within 0-100".to_string(),
            ));
        }

        Ok(())
    }
}
