pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ratelimit;
pub mod types;
pub mod utils;

pub use cache::{CacheStats, CacheStatus, Fingerprint, RedisMirror, ResultCache};
pub use config::{CacheSettings, Config, CorsConfig, MetricsConfig, PipelineConfig, RateLimitSettings, RetrySettings, SecuritySettings, ServerConfig, ThresholdSettings};
pub use error::{Error, ErrorCode, ErrorContext, ErrorMetrics, Result};
pub use metrics::{MetricsRegistry, MetricsService, PipelineMetrics};
pub use ratelimit::{AcquireMode, RateLimitController, RateLimitStats};
pub use types::*;

// Re-export commonly used types from dependencies
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;
