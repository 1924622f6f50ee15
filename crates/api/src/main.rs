//! # Investigation Pipeline API Server
//!
//! HTTP surface for the OSINT investigation pipeline, built on Axum.
//! The server carries the external interface only: submission, status,
//! report retrieval, progress streaming, and health/metrics endpoints.
//! Everything investigative happens in the pipeline crates.
//!
//! Middleware wraps every route, outermost first: security headers,
//! request-id propagation, trace spans, response compression, then CORS
//! from configuration.
//!
//! Start with `cargo run --bin osint-server`; the API mounts under
//! `/api/v1/`, liveness at `/health`, interactive docs at `/swagger-ui`,
//! and Prometheus text at the configured metrics path.

use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::{extract::State, Json, Router};
use osint_connectors::{
    BreachDirectoryConnector, CertTransparencyConnector, CodeRepositoryConnector, ConnectorRegistry,
    CorporateRegistryConnector, QueryScreen, ReqwestTransport, SocialProfileConnector,
    SourceConnector, WebArchiveConnector, WebSearchConnector, WhoisConnector,
};
use osint_core::{
    Config, CorsConfig, MetricsRegistry, MetricsService, PipelineMetrics, RateLimitController,
    RedisMirror, ResultCache,
};
use osint_pipeline::store::{InvestigationStore, MemoryStore, RedisStore};
use osint_pipeline::{CoordinatorConfig, InvestigationCoordinator};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api_middleware;
mod error;
mod handlers;
mod health;
mod state;

use crate::handlers::{connectors, events, investigations, reports};
use crate::state::AppState;

/// Parse every entry of a CORS list into its header/method type.
fn parse_all<T>(values: &[String]) -> Result<Vec<T>, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    values
        .iter()
        .map(|value| value.parse::<T>().map_err(Into::into))
        .collect()
}

fn build_cors_layer(cors: &CorsConfig) -> Result<CorsLayer, Box<dyn std::error::Error>> {
    let wildcard = |values: &[String]| values.iter().any(|value| value == "*");

    let mut layer = CorsLayer::new().allow_credentials(cors.allow_credentials);

    layer = match wildcard(&cors.allowed_origins) {
        true => layer.allow_origin(Any),
        false => layer.allow_origin(parse_all::<HeaderValue>(&cors.allowed_origins)?),
    };
    layer = match wildcard(&cors.allowed_methods) {
        true => layer.allow_methods(Any),
        false => layer.allow_methods(parse_all::<Method>(&cors.allowed_methods)?),
    };
    layer = match wildcard(&cors.allowed_headers) {
        true => layer.allow_headers(Any),
        false => layer.allow_headers(parse_all::<HeaderName>(&cors.allowed_headers)?),
    };
    if !cors.expose_headers.is_empty() {
        layer = layer.expose_headers(parse_all::<HeaderName>(&cors.expose_headers)?);
    }
    if let Some(secs) = cors.max_age {
        layer = layer.max_age(std::time::Duration::from_secs(secs));
    }

    Ok(layer)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting investigation pipeline server...");

    let config = Config::load()?;
    info!("Configuration loaded successfully");

    // Metrics registry and pipeline instruments.
    let metrics_registry = MetricsRegistry::new(config.metrics.clone());
    let pipeline_metrics = PipelineMetrics::new()?;
    pipeline_metrics.register(&metrics_registry);
    let metrics_service = Arc::new(MetricsService::new(metrics_registry));

    // Process-wide singletons: cache, rate limiter, connector registry.
    let cache = Arc::new(ResultCache::new(&config.cache));
    if let Some(redis_url) = &config.cache.redis_url {
        match RedisMirror::connect(redis_url).await {
            Ok(mirror) => {
                cache.attach_mirror(mirror).await;
                info!("Cache mirror attached");
            }
            Err(error) => {
                warn!(error = %error, "Cache mirror unavailable, running memory-only");
            }
        }
    }
    let rate_limiter = Arc::new(RateLimitController::new(config.rate_limit.clone()));

    let registry = Arc::new(ConnectorRegistry::new());
    register_connectors(&registry, &rate_limiter, &cache);
    info!("Registered {} connectors", registry.len());

    // Investigation store: Redis when reachable, memory otherwise.
    let store: Arc<dyn InvestigationStore> = match &config.cache.redis_url {
        Some(redis_url) => match RedisStore::connect(redis_url).await {
            Ok(store) => {
                info!("Investigation store backed by Redis");
                Arc::new(store)
            }
            Err(error) => {
                warn!(error = %error, "Redis store unavailable, using in-memory store");
                Arc::new(MemoryStore::new())
            }
        },
        None => Arc::new(MemoryStore::new()),
    };

    let screen = QueryScreen::with_patterns(config.security.blocked_patterns.clone())?;
    let coordinator = InvestigationCoordinator::with_metrics(
        Arc::clone(&registry),
        cache,
        rate_limiter,
        Arc::new(screen),
        store,
        CoordinatorConfig::from_config(&config),
        pipeline_metrics,
    );
    info!("Coordinator initialized");

    let app_state = AppState {
        config: config.clone(),
        coordinator,
        metrics: metrics_service,
        registry,
    };

    let app = create_app(app_state)?;

    let bind_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "accepting investigation requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Register the adapter set and declare each source's budget and TTL with
/// the shared controllers.
fn register_connectors(
    registry: &Arc<ConnectorRegistry>,
    rate_limiter: &Arc<RateLimitController>,
    cache: &Arc<ResultCache>,
) {
    let transport: Arc<dyn osint_connectors::HttpTransport> = Arc::new(ReqwestTransport::new());

    let connectors: Vec<Arc<dyn SourceConnector>> = vec![
        Arc::new(WebSearchConnector::new(Arc::clone(&transport))),
        Arc::new(SocialProfileConnector::new(Arc::clone(&transport))),
        Arc::new(CodeRepositoryConnector::new(Arc::clone(&transport))),
        Arc::new(WhoisConnector::new(Arc::clone(&transport))),
        Arc::new(CertTransparencyConnector::new(Arc::clone(&transport))),
        Arc::new(BreachDirectoryConnector::new(Arc::clone(&transport))),
        Arc::new(WebArchiveConnector::new(Arc::clone(&transport))),
        Arc::new(CorporateRegistryConnector::new(transport)),
    ];

    for connector in connectors {
        rate_limiter.declare_source(connector.source_name(), connector.rate_limit_per_hour());
        if let Some(ttl) = connector.cache_ttl() {
            cache.set_source_ttl(connector.source_name(), ttl);
        }
        registry.register(connector);
    }
}

fn create_app(state: AppState) -> Result<Router, Box<dyn std::error::Error>> {
    #[derive(OpenApi)]
    #[openapi(
        tags(
            (name = "health", description = "Health check endpoints"),
            (name = "investigations", description = "Investigation lifecycle"),
            (name = "reports", description = "Risk report retrieval"),
            (name = "events", description = "Progress streaming"),
        ),
        paths(health::health_check, health::readiness_check)
    )]
    struct ApiDoc;

    let metrics_path = state.config.metrics.path.clone();

    let router = Router::new()
        .nest("/api/v1", create_api_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", axum::routing::get(health::health_check))
        .route("/ready", axum::routing::get(health::readiness_check))
        .route(&metrics_path, axum::routing::get(metrics_endpoint))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(
                    api_middleware::security_headers::security_headers_middleware,
                ))
                .layer(axum::middleware::from_fn(
                    api_middleware::request_id::request_id_middleware,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(build_cors_layer(&state.config.cors)?),
        )
        .with_state(state)
        .fallback(handler_404);

    Ok(router)
}

fn create_api_routes() -> Router<AppState> {
    Router::new()
        .nest(
            "/investigations",
            investigations::investigation_routes()
                .merge(reports::report_routes())
                .merge(events::event_routes()),
        )
        .nest("/connectors", connectors::connector_routes())
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.get_metrics()
}

async fn handler_404() -> impl IntoResponse {
    // Same envelope shape as ApiError responses.
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": {
                "kind": "not_found",
                "message": "Resource not found",
            }
        })),
    )
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "osint_api=debug,osint_pipeline=debug,osint_connectors=debug,osint_core=debug,tower_http=info"
            .into()
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves on SIGINT or SIGTERM so axum can drain open connections;
/// in-flight investigations keep running on the coordinator's tasks until
/// the process exits.
async fn shutdown_signal() {
    #[cfg(unix)]
    let received = {
        use tokio::signal::unix::{signal, SignalKind};
        let mut interrupt = signal(SignalKind::interrupt()).expect("SIGINT handler");
        let mut terminate = signal(SignalKind::terminate()).expect("SIGTERM handler");
        tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        }
    };

    #[cfg(not(unix))]
    let received = {
        tokio::signal::ctrl_c().await.expect("ctrl-c handler");
        "ctrl-c"
    };

    info!(signal = received, "shutdown requested, draining server");
}
