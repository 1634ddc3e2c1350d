//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::services::ServeDir;

use crate::handlers::{get_video, health, ready, upload_thumbnail, upload_video};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Allowance for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let video_limit = usize::try_from(state.pipeline.config().max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    let thumbnail_limit = state
        .config
        .max_thumbnail_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    let upload_routes = Router::new()
        .route("/video_upload/:video_id", post(upload_video))
        .layer(DefaultBodyLimit::max(video_limit));

    let thumbnail_routes = Router::new()
        .route("/thumbnail_upload/:video_id", post(upload_thumbnail))
        .layer(DefaultBodyLimit::max(thumbnail_limit));

    let video_routes = Router::new().route("/videos/:video_id", get(get_video));

    let api_routes = Router::new()
        .merge(upload_routes)
        .merge(thumbnail_routes)
        .merge(video_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .nest_service("/assets", ServeDir::new(&state.config.assets_root))
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
