use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::core::config::{AppConfig, SecurityConfig};
use crate::core::signer::UrlSigner;
use crate::storage::fs::LocalFileStore;
use crate::storage::memory::InMemoryMetadataStore;
use crate::views::analytics::AnalyticsAggregator;
use crate::views::tracker::ViewTracker;

use super::handlers;
use super::middleware;

// ---------------------------------------------------------------------------
// Application state and router
// ---------------------------------------------------------------------------

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<InMemoryMetadataStore>,
    pub files: Arc<LocalFileStore>,
    pub signer: Arc<UrlSigner>,
    pub tracker: Arc<ViewTracker<InMemoryMetadataStore>>,
    pub analytics: Arc<AnalyticsAggregator<InMemoryMetadataStore>>,
    pub config: AppConfig,
    pub start_time: std::time::Instant,
    /// Prometheus metrics handle for rendering the /metrics endpoint.
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

/// Build the Axum router with all routes.
///
/// **Media API:**
/// - `POST /media`                        — Register a media asset
/// - `POST /media/upload`                 — Upload a media file
/// - `GET  /media/{media_id}/stream-url`  — Issue a signed stream URL
/// - `GET  /media/{media_id}/stream`      — Stream media bytes (signed)
/// - `POST /media/{media_id}/view`        — Record a view
/// - `GET  /media/{media_id}/analytics`   — Cached view analytics
/// - `GET  /media/{media_id}/view-log`    — Raw view log
///
/// **Operational (unauthenticated):**
/// - `GET /healthz`                       — Liveness probe
/// - `GET /metrics`                       — Prometheus metrics
pub fn build_router(state: AppState, security_config: &SecurityConfig) -> Router {
    tracing::info!(
        cache_control = %state.config.delivery.cache_control,
        cors_origins = ?state.config.delivery.cors_allowed_origins,
        "delivery configuration loaded"
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            http::Method::GET,
            http::Method::HEAD,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers([http::header::RANGE, http::header::CONTENT_TYPE])
        .expose_headers([
            http::header::CONTENT_LENGTH,
            http::header::CONTENT_RANGE,
            http::header::ACCEPT_RANGES,
            http::header::HeaderName::from_static("x-cache-status"),
        ])
        .max_age(std::time::Duration::from_secs(86400));

    // Uploads get their own, much larger body cap.
    let json_limit = DefaultBodyLimit::max(security_config.max_json_body_bytes);
    let upload_limit = DefaultBodyLimit::max(security_config.max_upload_size_bytes);

    Router::new()
        .route("/media", post(handlers::create_media))
        .route(
            "/media/upload",
            post(handlers::upload_media).layer(upload_limit),
        )
        .route(
            "/media/{media_id}/stream-url",
            get(handlers::stream_url),
        )
        .route("/media/{media_id}/stream", get(handlers::stream_media))
        .route("/media/{media_id}/view", post(handlers::record_view))
        .route("/media/{media_id}/analytics", get(handlers::analytics))
        .route("/media/{media_id}/view-log", get(handlers::view_log))
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(cors)
        .layer(json_limit)
        .layer(axum::middleware::from_fn(middleware::request_id))
        .with_state(state)
}
