//! Axum router configuration for all endpoints

use axum::{
  extract::DefaultBodyLimit,
  middleware,
  routing::{get, post},
  Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::server::handlers::{gallery, recommend, status};
use crate::server::middleware::request_context_middleware;
use crate::server::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
  let upload_limit = state.settings.max_upload_bytes;

  Router::new()
    // Status and version endpoints
    .route("/", get(status::root))
    .route("/status", get(status::status))
    .route("/version", get(status::version))
    // Gallery endpoints
    .route("/api/gallery", get(gallery::list_gallery))
    .route("/api/gallery/rebuild", post(gallery::rebuild_gallery))
    // Recommendation endpoint
    .route("/api/recommend", post(recommend::recommend))
    .layer(DefaultBodyLimit::max(upload_limit))
    .layer(middleware::from_fn(request_context_middleware))
    .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
    .with_state(state)
}
