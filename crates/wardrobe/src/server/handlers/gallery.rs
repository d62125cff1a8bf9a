//! Gallery inspection and rebuild handlers

use axum::{
  extract::{Extension, State},
  http::StatusCode,
  response::Json,
};
use std::time::Instant;
use tracing::{error, info};

use super::{error_failure, failure, ApiFailure};
use crate::server::middleware::RequestContext;
use crate::server::state::AppState;
use crate::server::types::{GalleryResponse, RebuildResponse};

/// GET /api/gallery - List the gallery currently being served
pub async fn list_gallery(State(state): State<AppState>) -> Json<GalleryResponse> {
  let gallery = state.gallery.snapshot().await;

  Json(GalleryResponse {
    size: gallery.len(),
    dimension: gallery.dimension(),
    identifiers: gallery.identifiers().to_vec(),
  })
}

/// POST /api/gallery/rebuild - Re-encode the source directory and swap in the result
pub async fn rebuild_gallery(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
) -> Result<Json<RebuildResponse>, ApiFailure> {
  let Some(guard) = state.try_begin_rebuild() else {
    return Err(failure(StatusCode::CONFLICT, "A gallery rebuild is already running"));
  };

  info!(request_id = %context.request_id, "Gallery rebuild requested");
  let start_time = Instant::now();

  let gallery = state.rebuild_gallery(guard).await.map_err(|e| {
    error!(request_id = %context.request_id, "Gallery rebuild failed: {e}");
    error_failure(e)
  })?;

  Ok(Json(RebuildResponse {
    size: gallery.len(),
    dimension: gallery.dimension(),
    duration_ms: start_time.elapsed().as_millis() as u64,
  }))
}
