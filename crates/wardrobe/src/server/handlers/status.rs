//! Status and version endpoint handlers

use axum::{extract::State, response::Json};

use crate::server::state::AppState;
use crate::server::types::{RootResponse, StatusResponse, VersionResponse};

/// GET / - Liveness probe
pub async fn root() -> Json<RootResponse> {
  Json(RootResponse { status: "ok".to_string() })
}

/// GET /status - Health check with gallery and model details
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
  let gallery = state.gallery.snapshot().await;

  Json(StatusResponse {
    status: "healthy".to_string(),
    version: env!("CARGO_PKG_VERSION").to_string(),
    model_id: state.encoder.model_id(),
    gallery_size: gallery.len(),
    dimension: state.encoder.dimension(),
    source_dir: state.settings.source_dir.to_string_lossy().to_string(),
    data_dir: state.settings.data_dir.to_string_lossy().to_string(),
    gallery_cached_at: state.store.cached_at(),
    started_at: state.started_at,
  })
}

/// GET /version - Returns current API version
pub async fn version() -> Json<VersionResponse> {
  Json(VersionResponse { version: env!("CARGO_PKG_VERSION").to_string() })
}
