//! Request and response bodies for the REST API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::server::services::similarity::Match;

// Recommendation Endpoint
// =======================

/// Query string for /api/recommend
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RecommendQuery {
  /// Number of matches to return; negative values are treated as zero
  pub k: Option<i64>,
}

/// Response for /api/recommend
#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendResponse {
  /// Best matches first
  pub matches: Vec<Match>,
}

/// Body returned with every non-success status
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
  pub error: String,
}

impl ErrorResponse {
  pub fn new(message: impl Into<String>) -> Self {
    Self { error: message.into() }
  }
}

// Status/Version Endpoints
// ========================

/// Response for the / liveness probe
#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
  pub status: String,
}

/// Response for /status
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
  pub status: String,
  pub version: String,
  pub model_id: String,
  pub gallery_size: usize,
  pub dimension: usize,
  pub source_dir: String,
  pub data_dir: String,
  /// When the persisted gallery was last written
  pub gallery_cached_at: Option<DateTime<Utc>>,
  pub started_at: DateTime<Utc>,
}

/// Response for /version
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse {
  pub version: String,
}

// Gallery Endpoints
// =================

/// Response for /api/gallery
#[derive(Debug, Serialize, Deserialize)]
pub struct GalleryResponse {
  pub size: usize,
  pub dimension: usize,
  /// Identifiers in gallery order
  pub identifiers: Vec<String>,
}

/// Response for /api/gallery/rebuild
#[derive(Debug, Serialize, Deserialize)]
pub struct RebuildResponse {
  pub size: usize,
  pub dimension: usize,
  pub duration_ms: u64,
}
