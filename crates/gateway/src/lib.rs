//! HTTP gateway for PyCoach.
//!
//! Serves the chat API, health and profile endpoints, and the embedded chat
//! page. Built on Axum.

pub mod api;
pub mod frontend;

#[cfg(test)]
pub(crate) mod test_support;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, extract::State, response::Json, routing::get};
use pycoach_config::{AppConfig, GatewayConfig};
use pycoach_memory::{FileProfileStore, InMemoryProfileStore, ProfileStore, SessionStore};
use pycoach_providers::{BackendRouter, build_cross_encoder, build_embedder};
use pycoach_retrieval::{RetrievalService, Reranker};
use pycoach_tutor::Tutor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::LatencyUnit;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};

pub use api::{ApiState, SharedApiState};

/// Request body cap.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the full router.
///
/// Layers applied:
/// - HTTP trace logging (method, path, status, latency)
/// - CORS restricted to the configured origins
/// - Request body size limit (1 MB)
pub fn build_router(state: SharedApiState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/api", api::api_router(state))
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(config))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
}

/// Same-origin by default; explicit origins can be configured.
fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let configured = if config.allowed_origins.is_empty() {
        vec![
            format!("http://localhost:{}", config.port),
            format!("http://127.0.0.1:{}", config.port),
        ]
    } else {
        config.allowed_origins.clone()
    };

    let origins: Vec<HeaderValue> = configured
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Wire up the tutor described by `config`.
///
/// The vector index, embedder and reranker are loaded once here. Failures
/// are logged and leave retrieval (or reranking) unavailable; they do not
/// stop the server.
pub async fn build_tutor(config: &AppConfig) -> Tutor {
    let profiles: Arc<dyn ProfileStore> = match config.profiles.backend.as_str() {
        "file" => Arc::new(FileProfileStore::new(&config.profiles.path)),
        _ => Arc::new(InMemoryProfileStore::new()),
    };
    let sessions = Arc::new(SessionStore::new(config.session.max_tokens, config.session.max_sessions));

    let embedder = build_embedder(&config.retrieval.embedding).await;
    let reranker = if config.rerank.enabled {
        Reranker::load(build_cross_encoder(&config.rerank).await).await
    } else {
        info!("Reranking disabled by configuration");
        Reranker::unavailable()
    };
    let retrieval = RetrievalService::open(
        &config.retrieval.index_dir,
        embedder,
        reranker,
        config.retrieval.top_k,
        config.rerank.top_n,
    );

    let router = BackendRouter::from_config(config);
    if !router.has_cloud_key() {
        warn!("No cloud API key configured; cloud requests must carry their own key");
    }

    info!(
        profiles = profiles.name(),
        retrieval = retrieval.status(),
        cloud_model = %config.cloud.model,
        local_model = %config.local.model,
        "Tutor ready"
    );

    Tutor::new(profiles, sessions, Arc::new(retrieval), router)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let tutor = build_tutor(&config).await;
    let state = Arc::new(ApiState { tutor });
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub retrieval: String,
}

async fn health_handler(State(state): State<SharedApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        retrieval: state.tutor.retrieval().status().into(),
    })
}
