//! MedForge API Gateway
//!
//! HTTP surface over the analysis engine.
//! Handles:
//! - Case analysis and operating mode inspection
//! - Rate limiting and concurrency limits
//! - Knowledge store seeding at startup
//! - Background health probing for mode promotion
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use medforge_common::{config::AppConfig, metrics, AppError};
use medforge_engine::Analyzer;
use medforge_knowledge::{
    load_ontology, load_seed, ConceptOntology, InMemoryKnowledgeStore, InMemoryOntology,
    KnowledgeStore,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub analyzer: Arc<Analyzer>,
    pub store: Arc<dyn KnowledgeStore>,
    pub ontology: Arc<dyn ConceptOntology>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config);
    info!(
        service = %config.observability.service_name,
        "Starting MedForge API Gateway v{}",
        medforge_common::VERSION
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .set_buckets_for_metric(
                Matcher::Full(format!("{}_analyze_duration_seconds", metrics::METRICS_PREFIX)),
                metrics::ANALYZE_BUCKETS,
            )?
            .install()?;
        metrics::register_metrics();
        info!(addr = %metrics_addr, "Prometheus exporter listening");
    }

    // Knowledge collaborators
    let store = Arc::new(InMemoryKnowledgeStore::new());
    let ontology = Arc::new(InMemoryOntology::with_defaults());
    if let Some(path) = &config.knowledge.ontology_path {
        load_ontology(path, &ontology).await?;
    }

    // Fails on missing backend credentials
    let analyzer = Arc::new(Analyzer::from_config(&config, store.clone(), ontology.clone()).map_err(
        |e| {
            tracing::error!(error = %e, "Invalid configuration");
            e
        },
    )?);

    if let Some(path) = &config.knowledge.seed_path {
        load_seed(path, store.as_ref(), analyzer.embedder().as_ref()).await?;
    } else {
        tracing::warn!("No seed path configured; the knowledge store starts empty");
    }

    tokio::spawn(analyzer.mode().clone().run_probe_loop());

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        analyzer,
        store,
        ontology,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| AppError::Configuration {
            message: format!("invalid server address: {}", e),
        })?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over `observability.log_level`
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let mut api_routes = Router::new()
        .route("/analyze", post(handlers::analyze::analyze))
        .route("/mode", get(handlers::mode::mode));

    let rate_limit = &state.config.rate_limit;
    if rate_limit.enabled {
        let limiter =
            middleware::create_rate_limiter(rate_limit.requests_per_second, rate_limit.burst);
        api_routes = api_routes.layer(from_fn_with_state(limiter, middleware::rate_limit_middleware));
    }

    // Compose the app
    Router::new()
        // Health endpoints (never rate limited)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .route_layer(from_fn(middleware::track_metrics))
        .layer(ConcurrencyLimitLayer::new(state.config.server.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
