//! Recommendation endpoint handler

use axum::{
  body::Bytes,
  extract::{
    multipart::{Multipart, MultipartRejection},
    rejection::QueryRejection,
    Extension, Query, State,
  },
  http::StatusCode,
  response::Json,
};
use tracing::{info, warn};

use super::{error_failure, failure, ApiFailure};
use crate::server::middleware::RequestContext;
use crate::server::services::similarity::top_k;
use crate::server::state::AppState;
use crate::server::types::{RecommendQuery, RecommendResponse};

/// Multipart field carrying the uploaded photo
pub const UPLOAD_FIELD: &str = "file";

/// POST /api/recommend - Rank the gallery against an uploaded image
pub async fn recommend(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  query: Result<Query<RecommendQuery>, QueryRejection>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RecommendResponse>, ApiFailure> {
  let Query(query) = query.map_err(|e| failure(StatusCode::BAD_REQUEST, e.body_text()))?;
  let multipart = multipart.map_err(|e| failure(StatusCode::BAD_REQUEST, e.body_text()))?;
  let k = resolve_k(query.k, state.settings.default_k);

  let upload = read_upload(multipart).await?;
  let upload_len = upload.len();

  let embedding = state.embed_upload(upload).await.map_err(|e| {
    warn!(request_id = %context.request_id, "Could not embed upload of {upload_len} bytes: {e}");
    error_failure(e)
  })?;

  let gallery = state.gallery.snapshot().await;
  let matches = top_k(&embedding, &gallery, k).map_err(|e| {
    warn!(request_id = %context.request_id, "Ranking failed: {e}");
    error_failure(e)
  })?;

  info!(
    request_id = %context.request_id,
    "Ranked {} gallery entries, returning {} matches",
    gallery.len(),
    matches.len()
  );
  Ok(Json(RecommendResponse { matches }))
}

/// Requested k, or the configured default; negative values clamp to zero
pub fn resolve_k(requested: Option<i64>, default_k: usize) -> usize {
  match requested {
    Some(k) => usize::try_from(k.max(0)).unwrap_or(usize::MAX),
    None => default_k,
  }
}

async fn read_upload(mut multipart: Multipart) -> Result<Bytes, ApiFailure> {
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| failure(e.status(), format!("Malformed multipart body: {}", e.body_text())))?
  {
    if field.name() == Some(UPLOAD_FIELD) {
      return field
        .bytes()
        .await
        .map_err(|e| failure(e.status(), format!("Could not read upload: {}", e.body_text())));
    }
  }

  Err(failure(StatusCode::BAD_REQUEST, format!("Missing multipart field `{UPLOAD_FIELD}`")))
}
